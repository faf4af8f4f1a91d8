//! CLI argument definitions for `segue-cli`.

use clap::{Arg, ArgAction, Command};

/// Options shared by the `play` and `render` subcommands.
fn queue_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("INPUT")
                .help("Audio files to queue, in playback order")
                .required(true)
                .num_args(1..)
                .action(ArgAction::Append)
                .index(1),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("Path to a JSON file with engine settings (format follows the first input)"),
        )
        .arg(
            Arg::new("GAIN")
                .long("gain")
                .short('g')
                .value_name("GAIN")
                .default_value("100")
                .help("The playback gain in percent"),
        )
        .arg(
            Arg::new("seam")
                .long("seam")
                .value_name("MODE")
                .value_parser(["block", "sample"])
                .default_value("block")
                .help("Start the next file on the next block, or mid-block"),
        )
        .arg(
            Arg::new("shuffle")
                .long("shuffle")
                .action(ArgAction::SetTrue)
                .help("Queue the inputs in random order"),
        )
}

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("segue")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Gapless queued playback of audio files")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(queue_args(
            Command::new("play").about("Play the inputs through the default output device"),
        ))
        .subcommand(
            queue_args(Command::new("render").about("Render the inputs to a WAV file")).arg(
                Arg::new("output")
                    .long("output")
                    .short('o')
                    .value_name("PATH")
                    .required(true)
                    .help("Destination WAV file (32-bit float)"),
            ),
        )
        .subcommand(Command::new("config").about("Print the default engine settings as JSON"))
}
