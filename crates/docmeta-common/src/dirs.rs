//! User directory resolution
//!
//! Follows the XDG base directory convention: `$XDG_CACHE_HOME/<app>` when
//! the variable holds an absolute path, `$HOME/.cache/<app>` otherwise.

use std::ffi::OsString;
use std::path::PathBuf;

/// Application directory name under the user cache directory
pub const DEFAULT_APP_NAME: &str = "gedit";

/// Resolve the per-application cache directory from the process environment
#[must_use]
pub fn user_cache_dir(app: &str) -> Option<PathBuf> {
    #[cfg(windows)]
    let home = std::env::var_os("LOCALAPPDATA").or_else(|| std::env::var_os("USERPROFILE"));
    #[cfg(not(windows))]
    let home = std::env::var_os("HOME");

    resolve_cache_dir(std::env::var_os("XDG_CACHE_HOME"), home, app)
}

/// Resolve the per-application cache directory from explicit variable values
#[must_use]
pub fn resolve_cache_dir(
    xdg_cache_home: Option<OsString>,
    home: Option<OsString>,
    app: &str,
) -> Option<PathBuf> {
    // A relative XDG_CACHE_HOME is ignored
    if let Some(xdg) = xdg_cache_home.map(PathBuf::from) {
        if xdg.is_absolute() {
            return Some(xdg.join(app));
        }
    }

    let home = home.map(PathBuf::from).filter(|h| !h.as_os_str().is_empty())?;
    Some(home.join(".cache").join(app))
}
