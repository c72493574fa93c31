use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use dropfs::{DropboxClient, DropboxConfig, Fs, FsConfig, Whence};

#[derive(Parser, Debug)]
#[command(name = "dropfs", about = "Browse and edit a Dropbox account as a filesystem")]
struct Args {
    /// Path inside the account every other path is relative to
    #[arg(long, global = true)]
    root: Option<String>,

    /// Entries requested per listing page
    #[arg(long, global = true)]
    page_size: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Show metadata of a path
    Stat { path: String },
    /// Print a file to stdout
    Cat {
        path: String,
        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Upload a local file
    Put { local: PathBuf, remote: String },
    /// Create a directory
    Mkdir {
        path: String,
        /// Create missing parents too
        #[arg(short, long)]
        parents: bool,
    },
    /// Delete a file or directory tree
    Rm { path: String },
    /// Move or rename
    Mv { from: String, to: String },
}

const LIST_BATCH: usize = 100;
const COPY_BUFFER: usize = 64 * 1024;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    env_logger::init();

    let args = Args::parse();

    let store_config = DropboxConfig::from_env();
    if store_config.token.is_none() {
        log::warn!("DROPBOX_TOKEN is not set; requests will be rejected");
    }
    let store = Arc::new(DropboxClient::new(&store_config));

    let mut config = FsConfig::from_env();
    if let Some(root) = args.root {
        config = config.with_root(root);
    }
    if let Some(limit) = args.page_size {
        config = config.with_dir_list_limit(limit);
    }
    let fs = Fs::new(store, config);

    if let Err(e) = run(&fs, args.command).await {
        log::error!("{}", e);
        eprintln!("dropfs: {}", e);
        std::process::exit(1);
    }
}

async fn run(fs: &Fs, command: Command) -> dropfs::Result<()> {
    match command {
        Command::Ls { path } => {
            let mut dir = fs.open(&path).await?;
            loop {
                let batch = dir.read_dir(LIST_BATCH).await?;
                for entry in &batch {
                    let kind = if entry.is_dir() { "d" } else { "-" };
                    println!(
                        "{} {:>12} {} {}",
                        kind,
                        entry.size(),
                        entry.mod_time().format("%Y-%m-%d %H:%M"),
                        entry.name()
                    );
                }
                if batch.len() < LIST_BATCH {
                    break;
                }
            }
            dir.close().await
        }
        Command::Stat { path } => {
            let info = fs.stat(&path).await?;
            println!("name:     {}", info.name());
            println!("type:     {}", if info.is_dir() { "directory" } else { "file" });
            println!("size:     {}", info.size());
            println!("modified: {}", info.mod_time().to_rfc3339());
            Ok(())
        }
        Command::Cat { path, offset } => {
            let mut file = fs.open(&path).await?;
            if offset != 0 {
                file.seek(offset, Whence::Start).await?;
            }
            let mut stdout = tokio::io::stdout();
            let mut buf = vec![0u8; COPY_BUFFER];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&buf[..n]).await?;
            }
            stdout.flush().await?;
            file.close().await
        }
        Command::Put { local, remote } => {
            let mut input = tokio::fs::File::open(&local).await?;
            let mut file = fs.create(&remote).await?;
            let mut buf = vec![0u8; COPY_BUFFER];
            loop {
                let n = input.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                file.write(&buf[..n]).await?;
            }
            file.close().await?;
            let info = file.stat().await?;
            log::info!("Uploaded {} ({} bytes)", file.name(), info.size());
            Ok(())
        }
        Command::Mkdir { path, parents } => {
            if parents {
                fs.mkdir_all(&path).await
            } else {
                fs.mkdir(&path).await.map(|_| ())
            }
        }
        Command::Rm { path } => fs.remove_all(&path).await.map(|_| ()),
        Command::Mv { from, to } => fs.rename(&from, &to).await.map(|_| ()),
    }
}
