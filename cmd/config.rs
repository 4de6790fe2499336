use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use edge_syncer::config::SyncConfig;
use edge_syncer::error::Result;

////////////////////////////////////////////////////////////
// Yaml parser
////////////////////////////////////////////////////////////
pub struct Parser;

impl Parser {
    pub fn parse_yaml<P: AsRef<Path>>(path: P) -> Result<SyncConfig> {
        let reader = Self::file_reader(path)?;
        let config: SyncConfig = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    fn file_reader<P: AsRef<Path>>(path: P) -> Result<BufReader<File>> {
        let f = std::fs::File::open(path)?;
        Ok(BufReader::new(f))
    }
}

////////////////////////////////////////////////////////////
// Unit test
////////////////////////////////////////////////////////////
#[cfg(test)]
#[path = "config_test.rs"]
mod test;
