//! Linux spidev output device
//!
//! Frames go out as a single blocking `write` on the spidev node. The bus
//! is set up once at open: mode 0, 8 bits per word, clock at the
//! configured baud rate.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::Path;

use anyhow::{Context, Result};
use julelys_core::{DeviceError, OutputDevice};
use tracing::info;

const SPI_IOC_MAGIC: u8 = b'k';
const SPI_IOC_TYPE_MODE: u8 = 1;
const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

const SPI_MODE_0: u8 = 0;
const BITS_PER_WORD: u8 = 8;

nix::ioctl_write_ptr!(spi_write_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
nix::ioctl_write_ptr!(spi_write_bits_per_word, SPI_IOC_MAGIC, SPI_IOC_TYPE_BITS_PER_WORD, u8);
nix::ioctl_write_ptr!(spi_write_max_speed_hz, SPI_IOC_MAGIC, SPI_IOC_TYPE_MAX_SPEED_HZ, u32);

/// An open spidev node
#[derive(Debug)]
pub struct SpiDevice {
    file: File,
    name: String,
}

impl SpiDevice {
    /// Open `path` and configure the bus for `baud_rate` Hz
    pub fn open(path: &Path, baud_rate: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open SPI device {path:?}"))?;

        let fd = file.as_raw_fd();
        // SAFETY: fd is an open spidev node and each pointer outlives its call.
        unsafe {
            spi_write_mode(fd, &SPI_MODE_0).context("Failed to set SPI mode")?;
            spi_write_bits_per_word(fd, &BITS_PER_WORD)
                .context("Failed to set SPI bits per word")?;
            spi_write_max_speed_hz(fd, &baud_rate).context("Failed to set SPI clock")?;
        }

        info!(path = ?path, baud_rate = baud_rate, "SPI device opened");
        Ok(Self {
            file,
            name: path.display().to_string(),
        })
    }
}

impl OutputDevice for SpiDevice {
    fn write(&mut self, bytes: &[u8]) -> Result<(), DeviceError> {
        let written = self.file.write(bytes)?;
        if written != bytes.len() {
            return Err(DeviceError::ShortWrite {
                written,
                expected: bytes.len(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_device_fails() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let err = SpiDevice::open(&temp_dir.path().join("spidev9.9"), 2_500_000).unwrap_err();
        assert!(err.to_string().contains("Failed to open SPI device"));
    }

    #[test]
    fn test_regular_file_is_not_a_bus() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("not-spi");
        std::fs::write(&path, b"").unwrap();
        assert!(SpiDevice::open(&path, 2_500_000).is_err());
    }
}
