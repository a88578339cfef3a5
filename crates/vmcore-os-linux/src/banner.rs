use vmcore_core::{Memory, Va};

const LINUX_VERSION_SIGNATURE: &[u8] = b"Linux version ";

/// Finds the `linux_banner` string in the kernel image.
///
/// The banner runs from `"Linux version "` up to the first newline. A
/// match that hits a NUL byte first is a format string or other stray
/// copy and is skipped.
pub fn find_banner(kernel: &Memory<Va>) -> Option<String> {
    let data = kernel.as_slice();

    for index in memchr::memmem::find_iter(data, LINUX_VERSION_SIGNATURE) {
        let banner = &data[index..];

        let end = match memchr::memchr2(b'\n', 0, banner) {
            Some(end) if banner[end] == b'\n' => end,
            _ => continue,
        };

        let banner_address = kernel.start() + index as u64;
        tracing::debug!(%banner_address, "found banner");

        return Some(String::from_utf8_lossy(&banner[..end]).into());
    }

    tracing::warn!("no banner found in kernel image");
    None
}
