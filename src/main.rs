use std::{path::PathBuf, process::ExitCode};

use board_selftest::{
    communication::open_port,
    config::Configuration,
    relay::relay,
    report::{write_ci_result, Verdict},
    selftest::{
        suite::{run_single, run_suite},
        Ds18b20SelfTest, GpioSelfTest, GpsSelfTest, SelfTest,
    },
};
use clap::{Parser, Subcommand};
use simplelog as sl;

const RELAY_READ_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(version, about = "Hardware self-tests with CI verdict output")]
struct Args {
    /// Path of the configuration file. Defaults are used if it does not exist.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// GT-U7 GPS self-test
    Gps {
        /// Serial device the GPS module is connected to
        #[arg(long)]
        uart: Option<String>,
    },
    /// DS18B20 temperature sensor self-test
    Ds18b20,
    /// GPIO loopback self-test
    Gpio,
    /// DS18B20, GPS and GPIO self-tests with a summary
    Suite,
    /// Run the test runner on the board and relay its verdict
    Relay {
        /// Serial device of the board
        #[arg(long)]
        uart: Option<String>,
        /// MicroPython module to import on the board
        #[arg(long)]
        runner: Option<String>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(verdict) => ExitCode::from(verdict.exit_code()),
        Err(e) => {
            eprintln!("{e:?}");
            let _ = write_ci_result(&mut std::io::stdout(), Verdict::Fail);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<Verdict> {
    let mut config = Configuration::from_file(&args.config)?;
    let _ = sl::WriteLogger::init(
        config.log_level(),
        sl::Config::default(),
        std::fs::File::create(&config.log_path)?,
    );
    log::info!("Running {:?} with {}", args.command, args.config.display());

    let mut out = std::io::stdout().lock();
    let verdict = match args.command {
        Command::Gps { uart } => {
            if let Some(uart) = uart {
                config.gps.uart = uart;
            }
            run_single(&mut GpsSelfTest::new(config.gps), &mut out)?
        }
        Command::Ds18b20 => run_single(&mut Ds18b20SelfTest::new(config.ds18b20), &mut out)?,
        Command::Gpio => run_single(&mut GpioSelfTest::new(config.gpio), &mut out)?,
        Command::Suite => {
            let mut tests: Vec<Box<dyn SelfTest>> = vec![
                Box::new(Ds18b20SelfTest::new(config.ds18b20)),
                Box::new(GpsSelfTest::new(config.gps)),
                Box::new(GpioSelfTest::new(config.gpio)),
            ];
            run_suite(&mut tests, &mut out)?
        }
        Command::Relay { uart, runner } => {
            if let Some(uart) = uart {
                config.relay.uart = uart;
            }
            if let Some(runner) = runner {
                config.relay.runner = runner;
            }
            let mut board =
                open_port(&config.relay.uart, config.relay.baudrate, RELAY_READ_TIMEOUT)?;
            relay(&mut board, &config.relay, &mut out)?
        }
    };

    log::info!("Verdict: {verdict}");
    Ok(verdict)
}
