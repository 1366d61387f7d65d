pub mod error;
pub mod load;
pub mod paths;
pub mod settings;
pub mod validate;

pub use error::ConfigError;
pub use load::load_global_settings;
pub use paths::{default_global_config_path, GLOBAL_SETTINGS_FILE_NAME, GLOBAL_STATE_DIR};
pub use settings::{
    ContextConfig, ExecutionConfig, JobsConfig, PartitionConfig, PartitionStrategy, Settings,
    WebSocketConfig,
};
pub use validate::validate_settings;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn default_global_config_path_targets_home_flowchat_config_yaml() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let temp = tempdir().expect("temp dir");
        let old_home = std::env::var_os("HOME");
        std::env::set_var("HOME", temp.path());

        let path = default_global_config_path().expect("resolve global config path");
        assert_eq!(path, temp.path().join(".flowchat/config.yaml"));

        if let Some(value) = old_home {
            std::env::set_var("HOME", value);
        } else {
            std::env::remove_var("HOME");
        }
    }

    #[test]
    fn load_global_settings_reads_flowchat_config_yaml() {
        let _guard = ENV_LOCK.lock().expect("env lock");
        let temp = tempdir().expect("temp dir");
        let base_dir = temp.path().join("data");
        fs::create_dir_all(temp.path().join(".flowchat")).expect("create config dir");

        let config_path = temp.path().join(".flowchat/config.yaml");
        fs::write(
            &config_path,
            format!("baseDir: {}\n", base_dir.display()),
        )
        .expect("write global config");

        let old_home = std::env::var_os("HOME");
        std::env::set_var("HOME", temp.path());
        let settings = load_global_settings().expect("load global settings");
        assert_eq!(settings.base_dir, base_dir);
        if let Some(value) = old_home {
            std::env::set_var("HOME", value);
        } else {
            std::env::remove_var("HOME");
        }
    }
}
