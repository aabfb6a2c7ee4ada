//! Web/OS collaborator - fire-and-forget "open this address" and
//! "launch this application" calls. Nothing waits for or verifies the
//! outcome beyond the spawn itself.

use crate::error::LaunchError;
use tracing::debug;

pub trait Launcher {
    /// Open `url` in the default browser
    fn open_url(&self, url: &str) -> Result<(), LaunchError>;

    /// Launch the application identified by `target`
    fn launch(&self, target: &str) -> Result<(), LaunchError>;
}

/// The desktop opener for this platform. On macOS `open` takes `.app`
/// bundles as well as URLs.
pub fn system_launcher() -> Box<dyn Launcher> {
    Box::new(DesktopLauncher)
}

/// Spawns the platform opener and does not wait on it
fn open_detached(target: &str) -> Result<(), LaunchError> {
    open::that_detached(target).map_err(|source| LaunchError::Open {
        target: target.to_string(),
        source,
    })
}

pub struct DesktopLauncher;

impl Launcher for DesktopLauncher {
    fn open_url(&self, url: &str) -> Result<(), LaunchError> {
        debug!(url, "open url");
        open_detached(url)
    }

    fn launch(&self, target: &str) -> Result<(), LaunchError> {
        debug!(target, "launch app");
        open_detached(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_names_target() {
        let err = LaunchError::Open {
            target: "/Applications/Missing.app".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().starts_with("failed to open /Applications/Missing.app"));
    }
}
