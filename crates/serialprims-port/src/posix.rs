use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use tracing::debug;

use crate::config::{BaudRate, DataBits, Parity, PortConfig, StopBits};
use crate::error::{PortError, Result};

/// Open a tty device and put it into raw, non-waiting mode.
///
/// The device is opened with `O_NONBLOCK` so a missing carrier cannot hang
/// the open call, then switched back to blocking mode. Reads still return
/// immediately because `VMIN` and `VTIME` are both zero.
pub(crate) fn open(path: &Path, config: &PortConfig) -> Result<File> {
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| PortError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    clear_nonblocking(&file).map_err(|source| PortError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    configure(&file, path, config)?;
    Ok(file)
}

fn clear_nonblocking(file: &File) -> std::io::Result<()> {
    let fd = file.as_raw_fd();
    // SAFETY: `fd` is an open descriptor owned by `file` for the duration of the call.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags == -1 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above; only the O_NONBLOCK bit is changed.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) };
    if rc == -1 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Apply `config` to an open tty with `tcsetattr(TCSANOW)`.
pub(crate) fn configure(file: &File, path: &Path, config: &PortConfig) -> Result<()> {
    let fd = file.as_raw_fd();
    let configure_error = |source: std::io::Error| PortError::Configure {
        path: path.to_path_buf(),
        source,
    };

    // SAFETY: termios is a plain C struct; all-zero is a valid bit pattern and
    // tcgetattr overwrites it.
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: `termios` is a valid writable pointer and `fd` is open.
    if unsafe { libc::tcgetattr(fd, &mut termios) } == -1 {
        return Err(configure_error(std::io::Error::last_os_error()));
    }

    // SAFETY: `termios` was initialised by tcgetattr above.
    unsafe { libc::cfmakeraw(&mut termios) };

    termios.c_iflag = libc::IGNPAR;
    termios.c_cflag &= !(libc::CSIZE | libc::PARENB | libc::PARODD | libc::CSTOPB);
    termios.c_cflag |= data_bits_flag(config.data_bits)
        | parity_flag(config.parity)
        | stop_bits_flag(config.stop_bits)
        | libc::CREAD
        | libc::CLOCAL;
    termios.c_cc[libc::VMIN] = 0;
    termios.c_cc[libc::VTIME] = 0;

    let speed = speed_for(config.baud_rate)?;
    // SAFETY: `termios` is a valid termios struct; speed is a platform speed value.
    let rc = unsafe {
        if libc::cfsetispeed(&mut termios, speed) == -1 {
            -1
        } else {
            libc::cfsetospeed(&mut termios, speed)
        }
    };
    if rc == -1 {
        return Err(configure_error(std::io::Error::last_os_error()));
    }

    // SAFETY: `termios` is fully initialised and `fd` is open.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &termios) } == -1 {
        return Err(configure_error(std::io::Error::last_os_error()));
    }

    debug!(?path, %config, "applied termios settings");
    Ok(())
}

fn data_bits_flag(bits: DataBits) -> libc::tcflag_t {
    match bits {
        DataBits::Five => libc::CS5,
        DataBits::Six => libc::CS6,
        DataBits::Seven => libc::CS7,
        DataBits::Eight => libc::CS8,
    }
}

fn parity_flag(parity: Parity) -> libc::tcflag_t {
    match parity {
        Parity::None => 0,
        Parity::Even => libc::PARENB,
        Parity::Odd => libc::PARENB | libc::PARODD,
    }
}

fn stop_bits_flag(stop_bits: StopBits) -> libc::tcflag_t {
    match stop_bits {
        StopBits::One => 0,
        StopBits::Two => libc::CSTOPB,
    }
}

#[cfg(target_os = "linux")]
fn speed_for(rate: BaudRate) -> Result<libc::speed_t> {
    let speed = match rate.get() {
        50 => libc::B50,
        75 => libc::B75,
        110 => libc::B110,
        134 => libc::B134,
        150 => libc::B150,
        200 => libc::B200,
        300 => libc::B300,
        600 => libc::B600,
        1200 => libc::B1200,
        1800 => libc::B1800,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        460_800 => libc::B460800,
        500_000 => libc::B500000,
        576_000 => libc::B576000,
        921_600 => libc::B921600,
        1_000_000 => libc::B1000000,
        1_152_000 => libc::B1152000,
        1_500_000 => libc::B1500000,
        2_000_000 => libc::B2000000,
        2_500_000 => libc::B2500000,
        3_000_000 => libc::B3000000,
        3_500_000 => libc::B3500000,
        4_000_000 => libc::B4000000,
        other => return Err(PortError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}

// BSD-derived termios (macOS included) stores the literal rate in speed_t.
#[cfg(not(target_os = "linux"))]
fn speed_for(rate: BaudRate) -> Result<libc::speed_t> {
    Ok(rate.get() as libc::speed_t)
}
