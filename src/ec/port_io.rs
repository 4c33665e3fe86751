use std::{
    fs::{File, OpenOptions},
    io,
    os::unix::fs::FileExt,
    path::Path,
};

use tracing::debug;

use crate::ec::EcError;

// Raw byte access to x86 I/O ports
pub trait PortIo: Send {
    fn read_port(&mut self, port: u16) -> io::Result<u8>;
    fn write_port(&mut self, port: u16, value: u8) -> io::Result<()>;
}

// Read access to the EC register space
pub trait EcRegisters: Send {
    fn read_register(&mut self, addr: u8) -> io::Result<u8>;
}

// I/O ports through the kernel /dev/port device, the file
// offset is the port number
pub struct DevPort {
    file: File,
}

impl DevPort {
    pub fn open(path: &Path) -> Result<Self, EcError> {
        debug!("Opening port device at: {:?}", path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| EcError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self { file })
    }
}

impl PortIo for DevPort {
    fn read_port(&mut self, port: u16) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.file.read_exact_at(&mut buf, port as u64)?;

        Ok(buf[0])
    }

    fn write_port(&mut self, port: u16, value: u8) -> io::Result<()> {
        self.file.write_all_at(&[value], port as u64)
    }
}

// EC registers through the ec_sys debugfs window
// (/sys/kernel/debug/ec/ec0/io), one byte per register
pub struct DebugfsRegisters {
    file: File,
}

impl DebugfsRegisters {
    pub fn open(path: &Path) -> Result<Self, EcError> {
        debug!("Opening EC register window at: {:?}", path);

        let file = File::open(path).map_err(|source| EcError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self { file })
    }
}

impl EcRegisters for DebugfsRegisters {
    fn read_register(&mut self, addr: u8) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.file.read_exact_at(&mut buf, addr as u64)?;

        Ok(buf[0])
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn debugfs_registers_read_at_offset() {
        let mut file = NamedTempFile::new().unwrap();
        let mut window = vec![0u8; 256];
        window[169] = 72;
        window[93] = 0x16;
        file.write_all(&window).unwrap();

        let mut registers = DebugfsRegisters::open(file.path()).unwrap();

        assert_eq!(registers.read_register(169).unwrap(), 72);
        assert_eq!(registers.read_register(93).unwrap(), 0x16);
        assert_eq!(registers.read_register(0).unwrap(), 0);
    }

    #[test]
    fn debugfs_registers_short_window_fails() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[1, 2, 3]).unwrap();

        let mut registers = DebugfsRegisters::open(file.path()).unwrap();

        assert!(registers.read_register(169).is_err());
    }

    #[test]
    fn dev_port_writes_at_port_offset() {
        let file = NamedTempFile::new().unwrap();
        file.as_file().set_len(0x100).unwrap();

        let mut ports = DevPort::open(file.path()).unwrap();
        ports.write_port(0x62, 0x94).unwrap();

        assert_eq!(ports.read_port(0x62).unwrap(), 0x94);
        assert_eq!(ports.read_port(0x66).unwrap(), 0);
    }

    #[test]
    fn open_missing_device_reports_path() {
        let err = DevPort::open(Path::new("/nonexistent/port")).err().unwrap();

        assert!(err.to_string().contains("/nonexistent/port"));
    }
}
