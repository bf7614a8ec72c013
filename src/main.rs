use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lungsight::report::{
    display_name, save_insight, summary_lines, LoadingIndicator, PresentationConfig,
};
use lungsight::{
    collect_image_files, open_image, relocate, Command, Config, MetricRegistry, OnnxModel, Pipeline,
};

type LoadedPipeline = Pipeline<OnnxModel, OnnxModel>;

fn main() -> Result<()> {
    let config = Config::new();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = MetricRegistry::standard();
    let pipeline = Pipeline::load(&config, &registry).context("Failed to load models")?;

    match &config.command {
        Command::Analyze { image, output_dir } => {
            analyze(&pipeline, image, &config.presentation(output_dir))
        }
        Command::Batch {
            input_dir,
            output_dir,
        } => batch(&pipeline, input_dir, &config.presentation(output_dir)),
        Command::Evaluate {
            image,
            ground_truth,
        } => evaluate(&pipeline, image, ground_truth, &registry),
    }
}

/// One upload: indicator on, analysis, indicator off, then either the results or a
/// single error message.
fn analyze(
    pipeline: &LoadedPipeline,
    image: &Path,
    presentation: &PresentationConfig,
) -> Result<()> {
    let name = display_name(image, presentation.name_limit);
    let indicator = LoadingIndicator::show(&name);
    let result = pipeline.run_inference(image);
    indicator.clear();

    let insight = match result {
        Ok(insight) => insight,
        Err(e) => {
            error!(error = ?e, "analysis failed");
            bail!("Please check your file type...\n{e}");
        }
    };

    let stem = file_stem(image);
    let saved = save_insight(&insight, &presentation.output_dir, &stem, presentation)?;

    println!("Uploaded File : {name}");
    for line in summary_lines(&insight) {
        println!("{line}");
    }
    println!("Original : {}", saved.original.display());
    println!("Mask     : {}", saved.mask.display());
    println!("Overlay  : {}", saved.overlay.display());
    Ok(())
}

fn batch(
    pipeline: &LoadedPipeline,
    input_dir: &Path,
    presentation: &PresentationConfig,
) -> Result<()> {
    ensure!(input_dir.exists(), "Input directory does not exist");

    let image_paths = collect_image_files(input_dir);
    if image_paths.is_empty() {
        info!(dir = %input_dir.display(), "no supported images found");
        return Ok(());
    }

    let progress_bar = ProgressBar::new(image_paths.len() as u64);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec} {eta})",
        )?
        .progress_chars("#>-"),
    );

    let mut failures = 0usize;
    for path in &image_paths {
        let outcome = pipeline.run_inference(path).and_then(|insight| {
            let dir = relocate(path, input_dir, &presentation.output_dir)?;
            save_insight(&insight, &dir, &file_stem(path), presentation)
                .map(|_| insight.diagnosis)
        });
        match outcome {
            Ok(diagnosis) => {
                progress_bar.println(format!("{}: {diagnosis}", path.display()));
            }
            Err(e) => {
                failures += 1;
                warn!(path = %path.display(), error = %e, "skipping image");
            }
        }
        progress_bar.inc(1);
    }
    progress_bar.finish();

    info!(
        total = image_paths.len(),
        failures,
        output = %presentation.output_dir.display(),
        "batch finished"
    );
    ensure!(
        failures == 0,
        "{failures} of {} images could not be analysed",
        image_paths.len()
    );
    Ok(())
}

fn evaluate(
    pipeline: &LoadedPipeline,
    image: &Path,
    ground_truth: &Path,
    registry: &MetricRegistry,
) -> Result<()> {
    let input = open_image(image)?;
    let truth = open_image(ground_truth)?;
    info!(
        image = %image.display(),
        ground_truth = %ground_truth.display(),
        "evaluating segmentation"
    );

    for score in pipeline.evaluate_segmentation(&input, &truth, registry)? {
        println!("{}: {:.4}", score.name, score.value);
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}
