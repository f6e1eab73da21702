//! Linux MTD device implementation

use crate::error::{LinuxMtdError, Result};
use bootcount_core::device::{BootCountDevice, DeviceError, RawGeometry};
use log::{debug, info};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Sysfs root for MTD devices
const MTD_SYSFS_ROOT: &str = "/sys/class/mtd";

/// Device root
const DEV_ROOT: &str = "/dev";

/// MTD flags from kernel headers
mod mtd_flags {
    /// MTD device is writable
    pub const MTD_WRITEABLE: u64 = 0x400;
}

/// How the partition holding the boot counter is named on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    /// Path to a device node, e.g. `/dev/mtd3`
    Path(PathBuf),
    /// MTD device number, from `mtdN`
    Index(u32),
    /// Partition name as listed in `/proc/mtd`, e.g. `s_env`
    Name(String),
}

impl FromStr for DeviceSpec {
    type Err = LinuxMtdError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(LinuxMtdError::InvalidDevice(s.to_string()));
        }
        if s.contains('/') {
            return Ok(Self::Path(PathBuf::from(s)));
        }
        if let Some(num) = mtd_index(s) {
            return Ok(Self::Index(num));
        }
        Ok(Self::Name(s.to_string()))
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Index(num) => write!(f, "mtd{}", num),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Parse `mtdN` into `N`
fn mtd_index(s: &str) -> Option<u32> {
    let digits = s.strip_prefix("mtd")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Configuration for opening a Linux MTD device
#[derive(Debug, Clone)]
pub struct LinuxMtdConfig {
    /// Partition to open
    pub device: DeviceSpec,
}

impl LinuxMtdConfig {
    /// Create a new configuration for the given partition
    pub fn new(device: DeviceSpec) -> Self {
        Self { device }
    }
}

/// Information about an MTD partition read from sysfs
#[derive(Debug, Clone)]
pub struct MtdInfo {
    /// Partition name from sysfs
    pub name: String,
    /// Device type ("nor", "nand", ...)
    pub dev_type: String,
    /// Whether the partition is writable
    pub is_writable: bool,
}

/// Linux MTD device handle
///
/// Wraps an open `/dev/mtdN` character device. Geometry is queried with
/// `MEMGETINFO` on every call; the file is closed when the handle is
/// dropped.
///
/// # Example
///
/// ```ignore
/// use bootcount_linux_mtd::{LinuxMtd, LinuxMtdConfig};
///
/// let spec = "s_env".parse()?;
/// let mut mtd = LinuxMtd::open(&LinuxMtdConfig::new(spec))?;
/// bootcount_core::reset_boot_count(&mut mtd)?;
/// ```
pub struct LinuxMtd {
    /// Device file handle
    file: File,
    /// Device node path
    path: PathBuf,
    /// Sysfs information, if the node maps to a sysfs entry
    info: Option<MtdInfo>,
}

impl LinuxMtd {
    /// Open the partition described by `config` for reading and writing
    ///
    /// # Errors
    /// Returns an error if:
    /// - No partition matches the device name or number
    /// - Sysfs reports the partition as read-only
    /// - The device node cannot be opened
    pub fn open(config: &LinuxMtdConfig) -> Result<Self> {
        let (path, sysfs) = resolve_device(&config.device, Path::new(MTD_SYSFS_ROOT))?;

        let info = match &sysfs {
            Some(sysfs_path) => Some(read_mtd_info(sysfs_path)?),
            None => None,
        };

        if let Some(info) = &info {
            debug!(
                "{}: name='{}', type={}, writable={}",
                path.display(),
                info.name,
                info.dev_type,
                info.is_writable
            );
            if !info.is_writable {
                return Err(LinuxMtdError::NotWritable(config.device.to_string()));
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| LinuxMtdError::Open {
                path: path.display().to_string(),
                source: e,
            })?;

        info!("Opened {} successfully", path.display());

        Ok(Self { file, path, info })
    }

    /// Device node path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sysfs information, if available
    pub fn info(&self) -> Option<&MtdInfo> {
        self.info.as_ref()
    }
}

/// Map a device spec to its device node and sysfs directory
fn resolve_device(spec: &DeviceSpec, sysfs_root: &Path) -> Result<(PathBuf, Option<PathBuf>)> {
    match spec {
        DeviceSpec::Path(path) => {
            let sysfs = path
                .file_name()
                .and_then(|name| name.to_str())
                .filter(|name| mtd_index(name).is_some())
                .map(|name| sysfs_root.join(name))
                .filter(|dir| dir.exists());
            Ok((path.clone(), sysfs))
        }
        DeviceSpec::Index(num) => {
            let sysfs = sysfs_root.join(format!("mtd{}", num));
            if !sysfs.exists() {
                return Err(LinuxMtdError::DeviceNotFound(format!(
                    "MTD device {} not found ({})",
                    num,
                    sysfs.display()
                )));
            }
            Ok((Path::new(DEV_ROOT).join(format!("mtd{}", num)), Some(sysfs)))
        }
        DeviceSpec::Name(name) => {
            let num = find_by_name(sysfs_root, name)?.ok_or_else(|| {
                LinuxMtdError::DeviceNotFound(format!("no partition named '{}'", name))
            })?;
            let sysfs = sysfs_root.join(format!("mtd{}", num));
            Ok((Path::new(DEV_ROOT).join(format!("mtd{}", num)), Some(sysfs)))
        }
    }
}

/// Find the lowest numbered MTD device whose sysfs name is `name`
fn find_by_name(sysfs_root: &Path, name: &str) -> Result<Option<u32>> {
    let entries = std::fs::read_dir(sysfs_root).map_err(|e| LinuxMtdError::SysfsRead {
        path: sysfs_root.display().to_string(),
        source: e,
    })?;

    let mut found = None;
    for entry in entries {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(num) = file_name.to_str().and_then(mtd_index) else {
            continue;
        };
        if read_sysfs_string(&entry.path(), "name")? == name {
            found = Some(found.map_or(num, |prev: u32| prev.min(num)));
        }
    }
    Ok(found)
}

/// Read a string from a sysfs file and sanitize it
fn read_sysfs_string(sysfs_path: &Path, filename: &str) -> Result<String> {
    let path = sysfs_path.join(filename);
    let content = std::fs::read_to_string(&path).map_err(|e| LinuxMtdError::SysfsRead {
        path: path.display().to_string(),
        source: e,
    })?;

    // Sanitize: remove non-printable characters and trailing whitespace
    let sanitized: String = content
        .chars()
        .take_while(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    Ok(sanitized.trim_end().to_string())
}

/// Read an integer from a sysfs file
fn read_sysfs_int(sysfs_path: &Path, filename: &str) -> Result<u64> {
    let value_str = read_sysfs_string(sysfs_path, filename)?;

    // Support hex (0x...) and decimal
    let value = if let Some(hex) = value_str
        .strip_prefix("0x")
        .or_else(|| value_str.strip_prefix("0X"))
    {
        u64::from_str_radix(hex, 16)
    } else {
        value_str.parse::<u64>()
    };

    value.map_err(|_| LinuxMtdError::SysfsParse {
        path: sysfs_path.join(filename).display().to_string(),
        value: value_str,
    })
}

/// Read MTD partition information from sysfs
fn read_mtd_info(sysfs_path: &Path) -> Result<MtdInfo> {
    let flags = read_sysfs_int(sysfs_path, "flags")?;
    let is_writable = (flags & mtd_flags::MTD_WRITEABLE) != 0;

    let name = read_sysfs_string(sysfs_path, "name")?;
    let dev_type = read_sysfs_string(sysfs_path, "type")?;

    Ok(MtdInfo {
        name,
        dev_type,
        is_writable,
    })
}

/// MEMGETINFO ioctl result structure
/// Matches struct mtd_info_user from mtd/mtd-user.h
#[repr(C)]
#[derive(Default)]
struct MtdInfoUser {
    mtd_type: u8,
    flags: u32,
    size: u32,
    erasesize: u32,
    writesize: u32,
    oobsize: u32,
    _padding: u64,
}

/// MEMERASE ioctl argument structure
/// Matches struct erase_info_user from mtd/mtd-user.h
#[repr(C)]
struct EraseInfo {
    start: u32,
    length: u32,
}

// MEMGETINFO = _IOR('M', 1, struct mtd_info_user)
nix::ioctl_read!(memgetinfo, b'M', 1, MtdInfoUser);
// MEMERASE = _IOW('M', 2, struct erase_info_user)
nix::ioctl_write_ptr!(memerase, b'M', 2, EraseInfo);

fn os_error(e: io::Error) -> DeviceError {
    DeviceError::Os(e.raw_os_error().unwrap_or(libc::EIO))
}

impl BootCountDevice for LinuxMtd {
    fn geometry(&mut self) -> std::result::Result<RawGeometry, DeviceError> {
        let mut info = MtdInfoUser::default();

        // SAFETY: We're calling an ioctl with a valid file descriptor and
        // a properly sized, writable MtdInfoUser struct
        unsafe {
            memgetinfo(self.file.as_raw_fd(), &mut info)
                .map_err(|errno| DeviceError::Os(errno as i32))?;
        }

        debug!(
            "MEMGETINFO: type={}, flags={:#x}, size={}, erasesize={}, writesize={}, oobsize={}",
            info.mtd_type, info.flags, info.size, info.erasesize, info.writesize, info.oobsize
        );

        Ok(RawGeometry {
            total_size: info.size,
            erase_size: info.erasesize,
            write_size: info.writesize,
        })
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> std::result::Result<(), DeviceError> {
        self.file
            .read_exact_at(buf, u64::from(offset))
            .map_err(os_error)
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> std::result::Result<usize, DeviceError> {
        self.file
            .write_at(data, u64::from(offset))
            .map_err(os_error)
    }

    fn erase(&mut self, start: u32, len: u32) -> std::result::Result<(), DeviceError> {
        let erase_info = EraseInfo { start, length: len };

        // SAFETY: We're calling an ioctl with a valid file descriptor and
        // a properly initialized EraseInfo struct
        unsafe {
            memerase(self.file.as_raw_fd(), &erase_info)
                .map_err(|errno| DeviceError::Os(errno as i32))?;
        }

        Ok(())
    }

    fn sync(&mut self) -> std::result::Result<(), DeviceError> {
        nix::unistd::sync();
        Ok(())
    }
}
