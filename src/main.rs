use anyhow::Result;
use minised::cli::{parse_args, Args};
use minised::config::{load_config, ProcessingOptions};
use minised::error::SedError;
use minised::file_processor::{FileProcessor, StreamProcessor};
use minised::input::InputChain;
use minised::logger::init_debug_logging;
use minised::output::OutputSink;
use minised::parser::Parser;
use std::io::{self, BufWriter};
use std::path::Path;
use std::process::ExitCode;
use tracing::debug;

/// Exit status when some input could not be opened
const EXIT_BAD_INPUT: u8 = 2;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            if let Some(clap_err) = e.downcast_ref::<clap::Error>() {
                // --help and --version land here too
                let _ = clap_err.print();
                return if clap_err.use_stderr() {
                    ExitCode::from(1)
                } else {
                    ExitCode::SUCCESS
                };
            }
            let code = e.downcast_ref::<SedError>().map_or(1, SedError::exit_code);
            eprintln!("minised: {:#}", e);
            ExitCode::from(code)
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = parse_args()?;
    let config = load_config()?;

    let debug_enabled = args.debug || config.logging.debug.unwrap_or(false);
    if let Some(path) = init_debug_logging(debug_enabled, config.logging.file.as_deref())? {
        debug!("Debug log at {}", path.display());
    }

    let mut options = ProcessingOptions::from_config(&config);
    args.apply_to(&mut options);
    debug!("Running with {:?}", options);

    let script = Parser::new(options.regex_flavor)
        .parse(&args.script)
        .map_err(SedError::from)?;
    let processor = StreamProcessor::new(script, options.clone());

    let had_open_error = match &args.in_place {
        Some(suffix) => edit_in_place(processor, &args, suffix)?,
        None => write_to_stdout(processor, &args, options.separate)?,
    };

    Ok(if had_open_error {
        ExitCode::from(EXIT_BAD_INPUT)
    } else {
        ExitCode::SUCCESS
    })
}

/// Run the script over the inputs, printing to standard output.
/// Returns whether some input could not be opened.
fn write_to_stdout(mut processor: StreamProcessor, args: &Args, separate: bool) -> Result<bool> {
    let stdout = io::stdout();
    let mut output = OutputSink::new(BufWriter::new(stdout.lock()));
    let mut had_open_error = false;

    if separate {
        let names = if args.files.is_empty() {
            vec!["-".to_string()]
        } else {
            args.files.clone()
        };
        for name in &names {
            if processor.has_quit() {
                break;
            }
            // A one-file chain reports and skips the file if it can't be read
            debug!("Processing {} as its own stream", name);
            let mut input = InputChain::new(std::slice::from_ref(name));
            processor.process(&mut input, &mut output)?;
            had_open_error |= input.had_open_error();
        }
    } else {
        let mut inputs = InputChain::new(&args.files);
        processor.process(&mut inputs, &mut output)?;
        had_open_error = inputs.had_open_error();
    }

    processor.finish()?;
    Ok(had_open_error)
}

fn edit_in_place(processor: StreamProcessor, args: &Args, suffix: &str) -> Result<bool> {
    let mut editor = FileProcessor::new(processor, Some(suffix.to_string()));

    for file in &args.files {
        if editor.has_quit() {
            break;
        }
        editor.apply_to_file(Path::new(file))?;
    }

    editor.finish()?;
    Ok(editor.had_open_error())
}
