//! remcall-cli - Demonstration client for remcall
//!
//! Copies a remote file to a local path over the call protocol, then
//! verifies the transfer by comparing the server's XOR checksum of the
//! source with a locally computed checksum of the copy.

use clap::Parser;
use colored::Colorize;
use remcall_client::{Client, ClientError, ConnectionConfig};
use remcall_protocol::call::OpenFlags;
use remcall_protocol::checksum::{xor_checksum, DEFAULT_BLOCK_SIZE};
use std::net::{SocketAddr, ToSocketAddrs};
use tracing_subscriber::EnvFilter;

/// Size of the buffer used to read from remote files.
const COPY_BUFFER_SIZE: usize = 1024;

#[derive(Parser)]
#[command(name = "remcall-cli")]
#[command(about = "Copies a remote file to a local path and verifies its checksum")]
#[command(version)]
struct Cli {
    /// Server hostname or IP address
    hostname: String,

    /// Server port
    port: u16,

    /// Path of the file on the server
    remote_path: String,

    /// Path of the local copy to create
    local_path: String,

    /// Block size for checksum reads
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    block_size: u32,
}

fn resolve(hostname: &str, port: u16) -> std::io::Result<SocketAddr> {
    (hostname, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address found for {hostname}"),
            )
        })
}

fn fail(step: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}: {}", "Error".red(), step, err);
    std::process::exit(1);
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let addr = match resolve(&cli.hostname, cli.port) {
        Ok(addr) => addr,
        Err(e) => fail("resolving server address", e),
    };

    let client = Client::new(ConnectionConfig::new(addr));
    if let Err(e) = client.connect().await {
        fail("connecting to server", e);
    }
    eprintln!("Connected to {}", addr);

    // Open the remote source read-only.
    let remote = match client
        .open(&cli.remote_path, OpenFlags::read_only(), None)
        .await
    {
        Ok(handle) => handle,
        Err(e) => fail("opening remote file", e),
    };
    eprintln!("Opened remote file {} (handle {})", cli.remote_path, remote);

    // Checksum the source before transferring anything.
    let remote_sum = match client.checksum(remote, cli.block_size).await {
        Ok(sum) => sum,
        Err(e) => fail("requesting remote checksum", e),
    };
    eprintln!("Remote checksum: {}", remote_sum);

    let mut local = match std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&cli.local_path)
    {
        Ok(file) => file,
        Err(e) => fail("creating local file", e),
    };

    // Copy until the remote reports EOF.
    let mut buf = [0u8; COPY_BUFFER_SIZE];
    let mut total: u64 = 0;
    loop {
        let n = match client.read(remote, &mut buf).await {
            Ok(n) => n,
            Err(e) => fail("reading from remote file", e),
        };
        if n == 0 {
            break;
        }
        if let Err(e) = std::io::Write::write_all(&mut local, &buf[..n]) {
            fail("writing to local file", e);
        }
        total += n as u64;
        tracing::debug!("copied {} bytes ({} total)", n, total);
    }
    eprintln!("Copy complete ({} bytes transferred)", total);

    if let Err(e) = client.close_file(remote).await {
        fail("closing remote file", e);
    }

    let local_sum = match xor_checksum(&mut local, cli.block_size) {
        Ok(sum) => sum,
        Err(e) => fail("computing local checksum", e),
    };
    eprintln!("Local checksum: {}", local_sum);

    client.close().await?;

    if remote_sum == local_sum {
        println!(
            "{}: file copied successfully (checksums match: {})",
            "SUCCESS".green(),
            local_sum
        );
        Ok(())
    } else {
        eprintln!(
            "{}: checksum mismatch (remote: {}, local: {})",
            "FAILED".red(),
            remote_sum,
            local_sum
        );
        std::process::exit(1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    run(cli).await?;
    Ok(())
}
