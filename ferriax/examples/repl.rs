//! Interactive REPL example
//!
//! This example starts a computer algebra system on a pseudo-terminal and
//! forwards lines from stdin to it. Results are printed with their parsed
//! type, or emitted as front-end frames with `--frames`.
//!
//! # Prerequisites
//!
//! - FriCAS, OpenAxiom or Axiom on `PATH`
//! - `latex` and `dvipng` for `--render`
//!
//! # Usage
//!
//! ```bash
//! cargo run --example repl -- --program fricas --arg -nosman
//! ```
//!
//! Front-end framing with TeX output:
//! ```bash
//! cargo run --example repl -- --program fricas --arg -nosman --frames
//! ```

use std::env;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};

use ferriax::{FrameEmitter, LatexToolchain, Session, SessionBuilder, TypesetConfig, Typesetter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut session = SessionBuilder::new(&args.program)
        .args(args.program_args.iter())
        .timeout(Duration::from_secs(args.timeout))
        .build()?;

    if !session.start().await? {
        if let Some(error) = session.last_error() {
            eprintln!("{}", error);
        }
        std::process::exit(1);
    }

    if args.frames {
        run_framed(&mut session).await?;
    } else {
        run_plain(&mut session, args.render).await?;
    }

    session.stop();
    Ok(())
}

/// Print results as text, one exchange per input line.
async fn run_plain(
    session: &mut Session,
    render: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let toolchain = LatexToolchain::new(TypesetConfig::default());
    print!("{}", session.banner().unwrap_or_default());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.starts_with(")quit") {
            break;
        }
        if !session.send(&line).await {
            if let Some(error) = session.last_error() {
                eprintln!("{}", error);
            }
            if !session.is_alive() {
                break;
            }
            continue;
        }

        match session.typed_result() {
            Ok(value) => println!("{}  : {}", value.value_text, value.type_tag),
            Err(_) => print!("{}", session.output().unwrap_or_default()),
        }

        if render && let Some(processed) = session.processed_output() {
            for math in &processed.math {
                match toolchain.render(math).await {
                    Ok(artifact) => println!("rendered {}", artifact.path.display()),
                    Err(e) => eprintln!("render failed: {}", e),
                }
            }
        }
    }
    Ok(())
}

/// Emit frames on stdout the way a TeXmacs-style front-end expects them.
async fn run_framed(session: &mut Session) -> Result<(), Box<dyn std::error::Error>> {
    let mut emitter = FrameEmitter::new(tokio::io::stdout());

    session.set_tex_output(true).await;
    session.set_algebra_output(false).await;

    let banner = session.banner().unwrap_or_default().to_string();
    let prompt = session.prompt().unwrap_or_default().to_string();
    emitter.emit_start(&banner, &prompt).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.starts_with(")quit") {
            session.stop();
            emitter.emit_status("terminated").await?;
            break;
        }

        if session.send(&line).await {
            if let Some(processed) = session.processed_output() {
                let prompt = session.prompt().unwrap_or_default().to_string();
                emitter.emit_exchange(&processed, &prompt).await?;
            }
        } else if let Some(error) = session.last_error() {
            emitter.emit_session_error(error).await?;
        }
    }
    Ok(())
}

struct Args {
    program: String,
    program_args: Vec<String>,
    timeout: u64,
    frames: bool,
    render: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().collect();
        let mut program = "fricas".to_string();
        let mut program_args = Vec::new();
        let mut timeout = 30u64;
        let mut frames = false;
        let mut render = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--program" | "-p" => {
                    i += 1;
                    if i < args.len() {
                        program = args[i].clone();
                    }
                }
                "--arg" | "-a" => {
                    i += 1;
                    if i < args.len() {
                        program_args.push(args[i].clone());
                    }
                }
                "--timeout" | "-t" => {
                    i += 1;
                    if i < args.len() {
                        timeout = args[i].parse().unwrap_or(30);
                    }
                }
                "--frames" | "-f" => frames = true,
                "--render" | "-r" => render = true,
                "--help" => {
                    println!("Usage: repl [--program NAME] [--arg ARG]... [--timeout SECS] [--frames] [--render]");
                    std::process::exit(0);
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            program,
            program_args,
            timeout,
            frames,
            render,
        }
    }
}
