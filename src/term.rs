// MIT License
// Copyright (c) 2024 Graham King

#[repr(C)]
struct Winsize {
    ws_row: u16,
    ws_col: u16,
    ws_xpixel: u16,
    ws_ypixel: u16,
}

/// Width of the terminal on stdout, None when it isn't one (pipes, tests, CI)
pub fn width() -> Option<usize> {
    let mut winsize: Winsize = unsafe { std::mem::zeroed() };
    let fd = 1; // standard output
    if unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut winsize) } == -1 || winsize.ws_col == 0 {
        return None;
    }
    Some(winsize.ws_col as usize)
}
