use std::path::PathBuf;

/// Fixed subdirectory under the application's data directory
pub const SAVE_SUBDIR: &str = "gameData";

/// Locates an application's save directory across platforms
#[derive(Clone, Debug)]
pub struct SaveLocator {
    company: String,
    product: String,
}

impl SaveLocator {
    pub fn new(company: impl Into<String>, product: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            product: product.into(),
        }
    }

    /// Get the per-user application data directory
    ///
    /// Returns:
    /// - Linux: $XDG_DATA_HOME/<company>/<product>, falling back to ~/.local/share
    /// - Windows: %LOCALAPPDATA%\<company>\<product>
    /// - macOS: ~/Library/Application Support/<company>/<product>
    pub fn data_directory(&self) -> Option<PathBuf> {
        let mut path = if cfg!(target_os = "linux") {
            match std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
                Some(xdg) => PathBuf::from(xdg),
                None => home()?.join(".local").join("share"),
            }
        } else if cfg!(target_os = "windows") {
            home()?.join("AppData").join("Local")
        } else if cfg!(target_os = "macos") {
            home()?.join("Library").join("Application Support")
        } else {
            return None;
        };

        path.push(&self.company);
        path.push(&self.product);

        Some(path)
    }

    /// Get the directory every profile file lives in
    pub fn save_directory(&self) -> Option<PathBuf> {
        Some(self.data_directory()?.join(SAVE_SUBDIR))
    }
}

fn home() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
