// Host platform detection

/// Host operating system, as far as pod routing cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }

    /// Only the BSD `route` command syntax found on macOS is supported
    pub fn supports_pod_routing(self) -> bool {
        self == Platform::MacOs
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::MacOs => write!(f, "macos"),
            Platform::Other => write!(f, "{}", std::env::consts::OS),
        }
    }
}
