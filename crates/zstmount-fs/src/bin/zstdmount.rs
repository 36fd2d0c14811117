//! zstdmount: Mount a zstd-compressed file as its uncompressed content.
//!
//! The mount point shows a single read-only file whose bytes are decoded on
//! demand; nothing is decompressed to disk.
//!
//! # Usage
//!
//! ```bash
//! zstdmount /mnt/item1.zst /mnt/zst/
//! cat /mnt/zst/zst | head
//! fusermount -u /mnt/zst/
//! ```

use clap::{ArgAction, Parser};
use env_logger::{Env, Target};
use log::{error, info};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use zstmount_decode::default_block_size;
use zstmount_fs::fuse;
use zstmount_fs::{MountConfig, ZstView};

/// Loop mount a ZSTD compressed file as the uncompressed file.
///
/// The uncompressed size is measured once at startup; every read is then
/// decoded on the fly from the compressed file.
#[derive(Parser, Debug)]
#[command(name = "zstdmount")]
#[command(author, version, about, long_about = None)]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    "\nLicense ",
    env!("CARGO_PKG_LICENSE"),
    "\nThere is NO WARRANTY, to the extent permitted by law."
))]
#[command(disable_version_flag = true)]
struct Args {
    /// ZSTD compressed file
    #[arg(value_name = "ZST_FILE")]
    source: PathBuf,

    /// Directory to mount the uncompressed file on
    #[arg(value_name = "MOUNT_PATH")]
    mount_point: PathBuf,

    /// Name of the uncompressed file inside the mount
    #[arg(short, long, default_value = "zst")]
    name: String,

    /// Decoder block size in bytes (default: zstd's recommended output size)
    #[arg(short, long, value_name = "BYTES")]
    block_size: Option<usize>,

    /// Decoded blocks to keep in memory between reads (0 disables the cache)
    #[arg(short, long, value_name = "BLOCKS", default_value = "0")]
    cache_blocks: usize,

    /// Threads serving reads (bounds concurrent decodes)
    #[arg(short, long, value_name = "THREADS", default_value = "4")]
    read_workers: usize,

    /// Allow other users to read the mount
    #[arg(long)]
    allow_other: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,

    /// Print version information
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,
}

/// Print a clap message (usage error, help or version) on standard output
/// and return the exit code to use.
fn report_usage<W: Write>(err: &clap::Error, out: &mut W) -> i32 {
    // Nothing sensible remains to do if stdout itself is broken.
    let _ = write!(out, "{}", err.render());
    let _ = out.flush();
    err.exit_code()
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => process::exit(report_usage(&e, &mut io::stdout())),
    };

    // Initialize logging; diagnostics go to standard output
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .target(Target::Stdout)
        .format_timestamp_millis()
        .init();

    // Validate source path
    if !args.source.exists() {
        error!("Compressed file not found: {}", args.source.display());
        process::exit(1);
    }

    if !args.source.is_file() {
        error!("Not a file: {}", args.source.display());
        process::exit(1);
    }

    let config = MountConfig {
        source: args.source,
        mount_point: args.mount_point,
        file_name: args.name,
        block_size: args.block_size.unwrap_or_else(default_block_size),
        cache_blocks: args.cache_blocks,
        allow_other: args.allow_other,
        read_workers: args.read_workers,
    };

    // Measure the uncompressed size before anything becomes visible
    let view = match ZstView::new(config) {
        Ok(v) => v,
        Err(e) => {
            error!("Failed to read compressed file: {}", e);
            process::exit(1);
        }
    };

    info!(
        "Exposing {} ({} bytes) as {}",
        view.config().source.display(),
        view.size(),
        view.config().mount_point.join(view.file_name()).display()
    );

    if let Err(e) = fuse::mount(view) {
        error!("Mount error: {}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn short_v_prints_version() {
        let err = Args::try_parse_from(["zstdmount", "-v"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);

        let mut out = Vec::new();
        assert_eq!(report_usage(&err, &mut out), 0);
        assert!(String::from_utf8(out).unwrap().contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn long_version_names_the_license() {
        let err = Args::try_parse_from(["zstdmount", "--version"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
        assert!(err.render().to_string().contains("License"));
    }

    #[test]
    fn missing_arguments_print_usage_to_the_given_writer() {
        let err = Args::try_parse_from(["zstdmount"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let mut out = Vec::new();
        let code = report_usage(&err, &mut out);
        assert_ne!(code, 0);
        assert!(String::from_utf8(out).unwrap().contains("Usage"));
    }

    #[test]
    fn verbose_is_long_only() {
        let args = Args::try_parse_from(["zstdmount", "--verbose", "a.zst", "/mnt/zst"]).unwrap();
        assert!(args.verbose);
        assert_eq!(args.source, PathBuf::from("a.zst"));
        assert_eq!(args.name, "zst");
        assert_eq!(args.read_workers, 4);
    }
}
