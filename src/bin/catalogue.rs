use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use catalogue_card_wasm::{
    Audience, CardEditor, Color, Crop, DEFAULT_PALETTE_SIZE, FormState, ImageAnalysis,
    analyze_image_bytes, render_card,
};
use clap::Parser;
use serde::Serialize;
use strum::IntoEnumIterator;
use tracing_subscriber::EnvFilter;

/// Suggest catalogue card colors for product photos and lay out the cards.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// One or more input image paths
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Maximum number of suggested background colors
    #[arg(short = 'k', long, default_value_t = DEFAULT_PALETTE_SIZE)]
    count: usize,

    /// Crop rectangle applied before analysis, as x,y,width,height
    #[arg(short, long)]
    crop: Option<Crop>,

    /// JSON file with the card's form fields; enables card output
    #[arg(short, long)]
    form: Option<PathBuf>,

    /// Only lay out the card for this audience (default: both)
    #[arg(short, long)]
    audience: Option<Audience>,

    /// Price bar color overriding the image's dominant color
    #[arg(short, long)]
    background: Option<Color>,

    /// Text color on the card
    #[arg(long, default_value = "white")]
    font_color: Color,

    /// Directory the card documents are written to
    #[arg(short = 'd', long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Serialize)]
struct Report<'a> {
    input: &'a Path,
    #[serde(flatten)]
    analysis: &'a ImageAnalysis,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let form: Option<FormState> = args
        .form
        .as_ref()
        .map(|path| -> Result<FormState> {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading form {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing form {}", path.display()))
        })
        .transpose()?;

    let audiences: Vec<Audience> = match args.audience {
        Some(audience) => vec![audience],
        None => Audience::iter().collect(),
    };

    for input in &args.inputs {
        let bytes = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
        let analysis = analyze_image_bytes(&bytes, args.count, args.crop)
            .with_context(|| format!("analysing {}", input.display()))?;

        println!(
            "{}",
            serde_json::to_string_pretty(&Report {
                input,
                analysis: &analysis,
            })?
        );

        let Some(form) = &form else {
            continue;
        };

        let mut editor = CardEditor::default();
        *editor.form_mut() = form.clone();
        editor.apply_analysis(analysis);
        editor.set_override(args.background);
        editor.set_font_color(args.font_color);
        let snapshot = editor.snapshot();

        fs::create_dir_all(&args.out_dir)?;
        for &audience in &audiences {
            let doc = render_card(&snapshot, audience);
            let out_path = args.out_dir.join(Path::new(&doc.file_name).with_extension("json"));
            fs::write(&out_path, serde_json::to_string_pretty(&doc)?)
                .with_context(|| format!("writing {}", out_path.display()))?;
            tracing::info!("Saved {} card → {}", audience, out_path.display());
        }
    }

    Ok(())
}
