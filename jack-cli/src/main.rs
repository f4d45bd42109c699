//! Entrypoint for CLI
mod error;

use std::{
    env, fs,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    process,
};

use jack::IMPL_VERSION;
use log::{error, info};

use crate::error::AppError;

static USAGE: &str = r#"
usage: jackc FILE|DIRECTORY

Compiles Jack source into Hack VM code. A FILE must have the
extension .jack and is compiled to a sibling file with the same
stem and the extension .vm. For a DIRECTORY, every .jack file
directly inside it is compiled the same way.

examples:
    jackc Main.jack
    jackc projects/Pong
"#;

fn main() {
    simple_logger::SimpleLogger::new().env().init().unwrap();

    let Some(path) = parse_args() else {
        print_usage();
        process::exit(-1);
    };

    if let Err(err) = run(Path::new(&path)) {
        error!("{err}");
        process::exit(-1);
    }
}

fn run(path: &Path) -> Result<(), AppError> {
    if path.is_dir() {
        compile_directory(path)
    } else if path.extension().map_or(false, |ext| ext == "jack") {
        compile_file(path)
    } else {
        Err(AppError::argument(
            "invalid argument: must be either a path to a .jack file \
             or a path to a directory containing .jack files",
        ))
    }
}

/// Compiles every immediate-child `.jack` file of the directory.
/// The first failing file aborts the batch.
fn compile_directory(dir: &Path) -> Result<(), AppError> {
    let entries = fs::read_dir(dir).map_err(|err| AppError::io(dir, err))?;

    let mut sources: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let path = entry.map_err(|err| AppError::io(dir, err))?.path();
        if path.is_file() && path.extension().map_or(false, |ext| ext == "jack") {
            sources.push(path);
        }
    }

    if sources.is_empty() {
        return Err(AppError::argument(format!(
            "the directory {} does not contain any .jack files",
            dir.display()
        )));
    }

    // Deterministic batch order.
    sources.sort();

    for source in &sources {
        compile_file(source)?;
    }

    Ok(())
}

/// Compiles one `.jack` file to its sibling `.vm` file.
fn compile_file(source: &Path) -> Result<(), AppError> {
    let target = source.with_extension("vm");
    info!("compiling {} -> {}", source.display(), target.display());

    let input = fs::File::open(source).map_err(|err| AppError::io(source, err))?;
    let output = fs::File::create(&target).map_err(|err| AppError::io(&target, err))?;
    let mut writer = BufWriter::new(output);

    jack::compile(BufReader::new(input), &mut writer)
        .map_err(|err| AppError::compile(source, err))?;
    writer.flush().map_err(|err| AppError::io(&target, err))?;

    Ok(())
}

/// Consumes the process arguments; exactly one path is expected.
fn parse_args() -> Option<String> {
    let mut args = env::args().skip(1);
    let path = args.next()?;
    if args.next().is_some() {
        return None;
    }
    Some(path)
}

fn print_usage() {
    println!("Jack compiler v{IMPL_VERSION}");
    println!("{USAGE}");
}
