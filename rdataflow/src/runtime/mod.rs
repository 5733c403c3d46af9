use std::convert::TryFrom;

pub mod cluster;
pub mod logger;
pub mod master;
pub mod state;
pub mod worker;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Eq, PartialEq)]
pub enum ClusterMode {
    /// master and workers share one process, fetches stay in memory
    Local = 0,
    /// every worker serves its partitions over TCP
    Standalone = 1,
}

impl Default for ClusterMode {
    fn default() -> Self {
        ClusterMode::Local
    }
}

impl<'a> TryFrom<&'a str> for ClusterMode {
    type Error = anyhow::Error;

    fn try_from(mode_str: &'a str) -> Result<Self, Self::Error> {
        let mode_str = mode_str.to_ascii_lowercase();
        match mode_str.as_str() {
            "" => Ok(ClusterMode::Local),
            "local" => Ok(ClusterMode::Local),
            "standalone" => Ok(ClusterMode::Standalone),
            _ => Err(anyhow::anyhow!("Unsupported mode {}", mode_str)),
        }
    }
}

impl std::fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterMode::Local => write!(f, "Local"),
            ClusterMode::Standalone => write!(f, "Standalone"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::TryFrom;

    use crate::runtime::ClusterMode;

    #[test]
    pub fn cluster_mode_test() {
        assert_eq!(ClusterMode::try_from("").unwrap(), ClusterMode::Local);
        assert_eq!(
            ClusterMode::try_from("StandAlone").unwrap(),
            ClusterMode::Standalone
        );
        assert!(ClusterMode::try_from("yarn").is_err());
        assert_eq!(ClusterMode::Standalone.to_string(), "Standalone");
    }
}
