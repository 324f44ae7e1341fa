//! Put command - writes one local file to every replica.

use std::path::Path;

use anyhow::{Context, Result, bail};
use replfs::{Coordinator, MAX_BLOCK_LENGTH, MAX_FILE_LENGTH, MAX_WRITES, ReplfsConfig};
use replfs_net::Channel;
use tracing::info;

pub fn run(config: &ReplfsConfig, local: &Path, name: Option<&str>) -> Result<()> {
    let data =
        std::fs::read(local).with_context(|| format!("Failed to read {}", local.display()))?;
    let file_name = match name {
        Some(name) => name.to_owned(),
        None => local
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .with_context(|| format!("{} has no usable file name", local.display()))?,
    };
    if data.len() as u64 > MAX_FILE_LENGTH {
        bail!(
            "{} is {} bytes; replicated files are limited to {MAX_FILE_LENGTH}",
            local.display(),
            data.len()
        );
    }

    let mut coordinator = Coordinator::connect(&replfs::client_config(config))
        .context("Failed to join the replica group")?;
    let blocks = put(&mut coordinator, &file_name, &data)?;
    info!(file = %file_name, bytes = data.len(), blocks, "file replicated");
    Ok(())
}

/// Opens `file_name`, writes `data` in full blocks with a commit every
/// [`MAX_WRITES`] writes, and closes. Returns the number of blocks written.
pub fn put<C: Channel>(
    coordinator: &mut Coordinator<C>,
    file_name: &str,
    data: &[u8],
) -> Result<usize> {
    let fd = coordinator
        .open(file_name)
        .with_context(|| format!("Failed to open {file_name}"))?;

    let mut blocks = 0;
    for (i, chunk) in data.chunks(MAX_BLOCK_LENGTH).enumerate() {
        let offset = u32::try_from(i * MAX_BLOCK_LENGTH)?;
        coordinator.write(fd, chunk, offset)?;
        blocks += 1;
        if blocks % MAX_WRITES == 0 {
            coordinator.commit(fd).context("Commit failed")?;
        }
    }

    coordinator
        .close(fd)
        .with_context(|| format!("Failed to close {file_name}"))?;
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use replfs_sim::{SimCluster, SimConfig};

    #[test]
    fn put_replicates_multi_commit_files() {
        let data: Vec<u8> = (0..MAX_BLOCK_LENGTH * (MAX_WRITES + 3))
            .map(|i| (i % 251) as u8)
            .collect();
        let mut coordinator = SimCluster::new(SimConfig::new(2).with_seed(9).with_loss(5))
            .unwrap()
            .connect()
            .unwrap();

        let blocks = put(&mut coordinator, "copy.bin", &data).unwrap();
        assert_eq!(blocks, MAX_WRITES + 3);
        for index in 0..2 {
            assert_eq!(
                coordinator.channel().file(index, "copy.bin").as_deref(),
                Some(&data[..])
            );
        }
    }

    #[test]
    fn put_of_an_empty_file_writes_nothing() {
        let mut coordinator = SimCluster::new(SimConfig::new(1)).unwrap().connect().unwrap();
        assert_eq!(put(&mut coordinator, "empty", &[]).unwrap(), 0);
        assert_eq!(coordinator.channel().file(0, "empty"), None);
        assert_eq!(coordinator.open_descriptor(), None);
    }
}
