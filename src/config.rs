use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use serde::Deserialize;

/// Deployment catalog: which instruments are bookable, who is on the team,
/// and where booking notices are addressed. Loaded once at startup and
/// injected into the shell. The engine never looks at it, so editing the
/// catalog changes only which candidate tuples get past the input surface.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub equipment: Vec<String>,
    /// Optional roster. Empty means any non-empty user name is accepted.
    #[serde(default)]
    pub team: Vec<String>,
    /// Notification recipients for the mail-compose link.
    #[serde(default)]
    pub recipients: Vec<String>,
}

impl Catalog {
    /// The lab's stock of potentiostats, used when no catalog file is given.
    pub fn builtin() -> Self {
        Self {
            equipment: vec![
                "DropSens (Old)".into(),
                "PalmSens (4 Channels)".into(),
                "PalmSens (8 Channels)".into(),
                "Portable Pstat".into(),
            ],
            team: Vec::new(),
            recipients: Vec::new(),
        }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file)).map_err(io::Error::other)
    }

    pub fn has_equipment(&self, name: &str) -> bool {
        self.equipment.iter().any(|e| e == name)
    }

    pub fn knows_user(&self, name: &str) -> bool {
        self.team.is_empty() || self.team.iter().any(|u| u == name)
    }
}
