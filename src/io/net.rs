use crate::{error::Result, io::progress::emit_download_progress};
use reqwest::blocking::Client;
use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::Path,
    time::Duration,
};
use tracing::{debug, info};

pub fn http_client() -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60 * 60))
        .user_agent(concat!("stem-karaoke/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Counts bytes on their way to disk and reports them.
struct Counting<W> {
    inner: W,
    written: u64,
    total: u64,
}

impl<W: Write> Write for Counting<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        emit_download_progress(self.written, self.total);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Streams `url` into `<dest>.part` and renames it over `dest` once complete.
/// Returns the number of bytes written.
pub fn download_with_progress(client: &Client, url: &str, dest: &Path) -> Result<u64> {
    let part = dest.with_extension("part");
    debug!(url, dest = %dest.display(), "downloading");

    let mut resp = client.get(url).send()?.error_for_status()?;
    let total = resp.content_length().unwrap_or(0);
    emit_download_progress(0, total);

    let mut sink = Counting {
        inner: BufWriter::new(File::create(&part)?),
        written: 0,
        total,
    };
    if let Err(e) = io::copy(&mut resp, &mut sink).and_then(|_| sink.flush()) {
        fs::remove_file(&part).ok();
        return Err(e.into());
    }
    let written = sink.written;
    drop(sink);

    // rename does not replace an existing file everywhere
    if dest.exists() {
        fs::remove_file(dest)?;
    }
    fs::rename(&part, dest)?;

    let done = total.max(written);
    emit_download_progress(done, done);
    info!(bytes = written, path = %dest.display(), "download complete");
    Ok(written)
}
