use std::{process, time::Duration};

use structopt::StructOpt;

use flood::{client, control::PORT, server};

#[derive(StructOpt)]
enum Command {
    /// Accept benchmark sessions until killed.
    Server,
    /// Run one timed test against a server.
    Client {
        /// Server host name or address.
        server: String,
        /// Number of parallel streams.
        #[structopt(short = "P", long, default_value = "1")]
        parallel: u8,
        /// Test duration in seconds.
        #[structopt(short = "t", long, default_value = "10")]
        time: u64,
        /// Also print the report as json.
        #[structopt(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::new()
        .format(|buf, record| {
            use std::{io::Write, time::SystemTime};
            use time::OffsetDateTime;

            let (hour, minute, second, micro) = OffsetDateTime::from(SystemTime::now())
                .time()
                .as_hms_micro();
            writeln!(
                buf,
                "{hour:02}:{minute:02}:{second:02}.{micro:06} [{}] {}",
                record.level(),
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        .init();

    match Command::from_args() {
        Command::Server => {
            if let Err(err) = ctrlc::set_handler(|| {
                log::info!("ctrlc");
                process::exit(0);
            }) {
                log::error!("failed to set ctrlc handler {err}");
            }
            server::run(PORT)
        }
        Command::Client {
            server,
            parallel,
            time,
            json,
        } => {
            let report = client::run(&server, parallel, Duration::from_secs(time))?;
            log::info!("{:.3} GB sent", report.gigabytes());
            log::info!("{:.3} Gbps", report.gigabits_per_sec());
            if json {
                println!("{}", serde_json::to_string(&report)?);
            }
            Ok(())
        }
    }
}
