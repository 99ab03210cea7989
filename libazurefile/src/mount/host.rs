//! Linux mount executor built on `nix` syscalls.
//!
//! Mount points are detected from `/proc/self/mountinfo`.  Before consulting
//! the table the path itself is stat'ed, so a dead network mount surfaces as
//! `ENOTCONN`/`ESTALE` instead of being reported as a healthy mount point.

use std::io;
use std::path::Path;

use async_trait::async_trait;
use nix::mount::{MsFlags, mount, umount};
use nix::sys::statvfs::statvfs;
use tracing::debug;

use super::MountExecutor;
use crate::types::VolumeUsage;

const MOUNTINFO: &str = "/proc/self/mountinfo";

/// Real mounts through the host kernel.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostMountExecutor;

impl HostMountExecutor {
    pub fn new() -> Self {
        Self
    }
}

/// Split `mount(8)`-style options into syscall flags and the filesystem data
/// string.  Sensitive options are appended to the data string only.
fn split_options(options: &[String], sensitive_options: &[String]) -> (MsFlags, Vec<String>) {
    let mut flags = MsFlags::empty();
    let mut data = Vec::new();
    for opt in options.iter().chain(sensitive_options) {
        match opt.as_str() {
            "bind" => flags |= MsFlags::MS_BIND,
            "rbind" => flags |= MsFlags::MS_BIND | MsFlags::MS_REC,
            "ro" => flags |= MsFlags::MS_RDONLY,
            "rw" | "defaults" => {}
            "remount" => flags |= MsFlags::MS_REMOUNT,
            "nosuid" => flags |= MsFlags::MS_NOSUID,
            "nodev" => flags |= MsFlags::MS_NODEV,
            "noexec" => flags |= MsFlags::MS_NOEXEC,
            "noatime" => flags |= MsFlags::MS_NOATIME,
            "" => {}
            other => data.push(other.to_owned()),
        }
    }
    (flags, data)
}

/// Undo the octal escaping `/proc/self/mountinfo` applies to space, tab,
/// newline and backslash.
fn unescape_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(value) = u8::try_from(value) {
                    out.push(value);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Mount points listed in a mountinfo table.  Field 5 is the mount point.
fn mount_points(mountinfo: &str) -> impl Iterator<Item = String> + '_ {
    mountinfo
        .lines()
        .filter_map(|line| line.split_whitespace().nth(4))
        .map(unescape_mount_path)
}

#[async_trait]
impl MountExecutor for HostMountExecutor {
    async fn mount(
        &self,
        source: &str,
        target: &Path,
        fs_type: &str,
        options: &[String],
        sensitive_options: &[String],
    ) -> io::Result<()> {
        let (flags, data) = split_options(options, sensitive_options);
        let data = data.join(",");
        let fs_type = (!fs_type.is_empty()).then_some(fs_type);

        debug!(
            source,
            target = %target.display(),
            ?fs_type,
            ?flags,
            ?options,
            "mounting"
        );

        mount(
            Some(source),
            target,
            fs_type,
            flags,
            (!data.is_empty()).then_some(data.as_str()),
        )?;

        // The kernel ignores MS_RDONLY on the initial bind mount; a remount
        // is needed to enforce read-only access.
        if flags.contains(MsFlags::MS_BIND | MsFlags::MS_RDONLY)
            && !flags.contains(MsFlags::MS_REMOUNT)
        {
            mount(
                None::<&str>,
                target,
                None::<&str>,
                MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
                None::<&str>,
            )?;
        }
        Ok(())
    }

    async fn unmount(&self, target: &Path) -> io::Result<()> {
        umount(target)?;
        Ok(())
    }

    async fn is_mount_point(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::metadata(path).await?;
        let canonical = tokio::fs::canonicalize(path).await?;
        let table = tokio::fs::read_to_string(MOUNTINFO).await?;
        Ok(mount_points(&table).any(|mp| Path::new(&mp) == canonical))
    }

    async fn path_exists(&self, path: &Path) -> io::Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn stat_volume(&self, target: &Path) -> io::Result<VolumeUsage> {
        let stat = statvfs(target)?;
        let fragment = stat.fragment_size() as u64;
        let blocks = stat.blocks() as u64;
        let free = stat.blocks_free() as u64;
        let available = stat.blocks_available() as u64;
        let files = stat.files() as u64;
        let files_free = stat.files_free() as u64;

        Ok(VolumeUsage {
            total_bytes: blocks.saturating_mul(fragment),
            used_bytes: blocks.saturating_sub(free).saturating_mul(fragment),
            available_bytes: available.saturating_mul(fragment),
            total_inodes: files,
            used_inodes: files.saturating_sub(files_free),
            available_inodes: files_free,
        })
    }
}
