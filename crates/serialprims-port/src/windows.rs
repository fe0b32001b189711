use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::os::windows::io::AsRawHandle;
use std::path::{Path, PathBuf};

use tracing::debug;
use windows_sys::Win32::Devices::Communication::{
    GetCommState, SetCommState, SetCommTimeouts, COMMTIMEOUTS, DCB, EVENPARITY, NOPARITY,
    ODDPARITY, ONESTOPBIT, TWOSTOPBITS,
};
use windows_sys::Win32::Foundation::HANDLE;

use crate::config::{Parity, PortConfig, StopBits};
use crate::error::{PortError, Result};

/// Open a COM port. Bare names such as `COM3` are expanded to `\\.\COM3`.
pub(crate) fn open(path: &Path, config: &PortConfig) -> Result<File> {
    let device = device_path(path);
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&device)
        .map_err(|source| PortError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    configure(&file, path, config)?;
    Ok(file)
}

fn device_path(path: &Path) -> PathBuf {
    let raw = path.as_os_str().to_string_lossy();
    if raw.starts_with(r"\\.\") {
        return path.to_path_buf();
    }
    let mut device = OsString::from(r"\\.\");
    device.push(path.as_os_str());
    PathBuf::from(device)
}

/// Apply `config` through the DCB and make reads return immediately.
pub(crate) fn configure(file: &File, path: &Path, config: &PortConfig) -> Result<()> {
    let handle = file.as_raw_handle() as HANDLE;
    let configure_error = || PortError::Configure {
        path: path.to_path_buf(),
        source: std::io::Error::last_os_error(),
    };

    // SAFETY: DCB is a plain C struct; zero is a valid starting value and
    // GetCommState fills it in.
    let mut dcb: DCB = unsafe { std::mem::zeroed() };
    dcb.DCBlength = std::mem::size_of::<DCB>() as u32;
    // SAFETY: `handle` belongs to `file` and `dcb` is a valid writable pointer.
    if unsafe { GetCommState(handle, &mut dcb) } == 0 {
        return Err(configure_error());
    }

    dcb.BaudRate = config.baud_rate.get();
    dcb.ByteSize = config.data_bits.bits();
    dcb.Parity = match config.parity {
        Parity::None => NOPARITY,
        Parity::Even => EVENPARITY,
        Parity::Odd => ODDPARITY,
    };
    dcb.StopBits = match config.stop_bits {
        StopBits::One => ONESTOPBIT,
        StopBits::Two => TWOSTOPBITS,
    };
    // SAFETY: as above; `dcb` is fully initialised.
    if unsafe { SetCommState(handle, &dcb) } == 0 {
        return Err(configure_error());
    }

    // MAXDWORD interval with zero totals: ReadFile returns whatever is buffered.
    let timeouts = COMMTIMEOUTS {
        ReadIntervalTimeout: u32::MAX,
        ReadTotalTimeoutMultiplier: 0,
        ReadTotalTimeoutConstant: 0,
        WriteTotalTimeoutMultiplier: 1,
        WriteTotalTimeoutConstant: 10,
    };
    // SAFETY: `timeouts` is a valid pointer for the duration of the call.
    if unsafe { SetCommTimeouts(handle, &timeouts) } == 0 {
        return Err(configure_error());
    }

    debug!(?path, %config, "applied comm state");
    Ok(())
}
