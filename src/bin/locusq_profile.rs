//! CLI tool for inspecting and editing LocusQ calibration profiles.
//!
//! # Usage
//!
//! ```bash
//! # Print the active profile (or the built-in defaults)
//! locusq_profile show
//!
//! # Write a fresh profile, tuned for a named headphone
//! locusq_profile init --headphone-name "WH-1000XM5"
//!
//! # Pick the closest measured HRTF subject for a listener photo
//! locusq_profile match --image listener.png --apply
//! ```

use std::env;
use std::path::PathBuf;

use locusq_companion::headphones;
use locusq_companion::matching::SubjectMatcher;
use locusq_companion::profile::{CalibrationProfile, HrtfMode, ProfileStore};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match parse_args(&args) {
        Ok(Some(config)) => config,
        Ok(None) => {
            print_usage(&args[0]);
            std::process::exit(0);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(&args[0]);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

enum Command {
    Show,
    Init {
        headphone_name: Option<String>,
        force: bool,
    },
    Match {
        image: String,
        catalog: Option<String>,
        apply: bool,
    },
}

struct Config {
    command: Command,
    profile_dir: Option<String>,
}

/// Parse the command line. `Ok(None)` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Config>, String> {
    let mut command_name: Option<String> = None;
    let mut profile_dir = None;
    let mut headphone_name = None;
    let mut force = false;
    let mut image = None;
    let mut catalog = None;
    let mut apply = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--profile-dir" | "-d" => {
                profile_dir = Some(take_value(args, &mut i, "--profile-dir")?.to_string());
            }
            "--headphone-name" => {
                headphone_name = Some(take_value(args, &mut i, "--headphone-name")?.to_string());
            }
            "--image" | "-i" => {
                image = Some(take_value(args, &mut i, "--image")?.to_string());
            }
            "--catalog" => {
                catalog = Some(take_value(args, &mut i, "--catalog")?.to_string());
            }
            "--force" | "-f" => {
                force = true;
            }
            "--apply" => {
                apply = true;
            }
            "--help" | "-h" => {
                return Ok(None);
            }
            arg if !arg.starts_with('-') => {
                if command_name.is_some() {
                    return Err(format!("Unexpected argument: {}", arg));
                }
                command_name = Some(arg.to_string());
            }
            _ => {
                return Err(format!("Unknown argument: {}", args[i]));
            }
        }
        i += 1;
    }

    let command = match command_name.as_deref() {
        Some("show") => Command::Show,
        Some("init") => Command::Init {
            headphone_name,
            force,
        },
        Some("match") => Command::Match {
            image: image.ok_or("match requires --image <PATH>")?,
            catalog,
            apply,
        },
        Some(other) => {
            return Err(format!(
                "Unknown command: {} (use show, init, or match)",
                other
            ));
        }
        None => return Err("Missing command (use show, init, or match)".to_string()),
    };

    Ok(Some(Config {
        command,
        profile_dir,
    }))
}

fn take_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str, String> {
    *i += 1;
    if *i >= args.len() {
        return Err(format!("Missing value for {}", flag));
    }
    Ok(&args[*i])
}

fn print_usage(program: &str) {
    eprintln!(
        r#"
Usage: {} <COMMAND> [OPTIONS]

Inspect and edit the LocusQ calibration profile.

COMMANDS:
    show     Print the active profile (built-in defaults if none on disk)
    init     Write a fresh default profile
    match    Find the closest measured HRTF subject for a listener photo

OPTIONS:
    -d, --profile-dir <DIR>       Use a single profile directory instead of
                                  the standard search paths
        --headphone-name <NAME>   (init) Preconfigure EQ/mode for a detected
                                  headphone model
    -f, --force                   (init) Overwrite an existing profile
    -i, --image <PATH>            (match) Listener photo to embed
        --catalog <FILE>          (match) Subject embedding catalog JSON
        --apply                   (match) Write the matched subject into the
                                  profile
    -h, --help                    Show this help message

EXAMPLES:
    {} show
    {} init --headphone-name "AirPods Pro (2nd generation)"
    {} match --image listener.png --apply
"#,
        program, program, program, program
    );
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &config.profile_dir {
        Some(dir) => ProfileStore::at_dir(dir),
        None => ProfileStore::at_default_locations()?,
    };

    match config.command {
        Command::Show => show(&store),
        Command::Init {
            headphone_name,
            force,
        } => init(&store, headphone_name.as_deref(), force),
        Command::Match {
            image,
            catalog,
            apply,
        } => match_subject(&store, &image, catalog.as_deref(), apply),
    }
}

fn show(store: &ProfileStore) -> Result<(), Box<dyn std::error::Error>> {
    println!("Calibration Profile");
    println!("===================");
    println!();
    println!("Search paths (* = present):");
    for path in store.candidates() {
        let marker = if path.exists() { "*" } else { " " };
        println!("  {} {}", marker, path.display());
    }
    println!();

    match store.load() {
        Some(profile) => println!("{}", profile.to_json_pretty()?),
        None => {
            println!("No profile on disk; built-in defaults:");
            println!();
            println!("{}", CalibrationProfile::default_profile().to_json_pretty()?);
        }
    }
    Ok(())
}

fn init(
    store: &ProfileStore,
    headphone_name: Option<&str>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !force && store.load().is_some() {
        return Err("a profile already exists (use --force to overwrite)".into());
    }

    let mut profile = CalibrationProfile::default_profile();
    if let Some(name) = headphone_name {
        let detected = headphones::detect(name);
        println!("Detected headphone: {}", detected.display_name);
        println!(
            "  Head tracking: {}",
            if detected.supports_head_tracking() {
                "supported"
            } else {
                "not supported"
            }
        );
        detected.apply_to(&mut profile);
    }

    store.save(&profile)?;
    if let Some(primary) = store.candidates().first() {
        println!("Profile written to {}", primary.display());
    }
    Ok(())
}

fn match_subject(
    store: &ProfileStore,
    image: &str,
    catalog: Option<&str>,
    apply: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let matcher = match catalog {
        Some(path) => SubjectMatcher::from_candidate_files(&[PathBuf::from(path)]),
        None => SubjectMatcher::with_default_catalog(),
    };

    let result = matcher.match_photo_file(image)?;

    println!("HRTF Subject Match");
    println!("==================");
    println!("  Photo: {}", image);
    println!("  Catalog entries: {}", matcher.entries().len());
    println!("  Subject: {}", result.subject_id);
    println!("  Similarity: {:.4}", result.similarity_score);
    println!("  SOFA: {}", result.sofa_ref);

    if apply {
        let mut profile = store
            .load()
            .unwrap_or_else(CalibrationProfile::default_profile);
        profile.user.subject_id = result.subject_id.clone();
        profile.user.sofa_ref = result.sofa_ref.clone();
        profile.headphone.hp_hrtf_mode = HrtfMode::Sofa;
        store.save(&profile)?;
        println!();
        println!("Profile updated: subject {} -> {}", result.subject_id, result.sofa_ref);
    }
    Ok(())
}
