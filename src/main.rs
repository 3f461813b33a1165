use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use imgbundle::image_bundle::{
    BundleConfig, BundleLayout, BundleReader, CodecConfig, CodecRegistry, ImageFormat,
    compute_splits,
};
use imgbundle::logger;

use tracing::{error, info, warn};

const USAGE: &str = "usage:
  imgbundle info <bundle>
  imgbundle extract <bundle> <index> <output>
  imgbundle splits <bundle> <block-size> [count]";

fn main() -> Result<()> {
    logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let registry = Arc::new(CodecRegistry::with_defaults(CodecConfig::default()));
    let config = BundleConfig::default();

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["info", bundle] => info_cmd(PathBuf::from(bundle), registry, &config),
        ["extract", bundle, index, output] => {
            let index: usize = index
                .parse()
                .with_context(|| format!("invalid image index '{}'", index))?;
            extract_cmd(PathBuf::from(bundle), index, PathBuf::from(output), registry, &config)
        }
        ["splits", bundle, block_size] => splits_cmd(PathBuf::from(bundle), block_size, "0"),
        ["splits", bundle, block_size, count] => {
            splits_cmd(PathBuf::from(bundle), block_size, count)
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("unrecognized arguments: {:?}", args);
        }
    }
}

fn info_cmd(bundle: PathBuf, registry: Arc<CodecRegistry>, config: &BundleConfig) -> Result<()> {
    let mut reader = BundleReader::open(&bundle, registry, config)
        .with_context(|| format!("failed to open bundle {}", bundle.display()))?;
    info!(
        "{} -> {} ({} images)",
        reader.index_path().display(),
        reader.data_file_path().display(),
        reader.image_count()
    );

    while reader.advance()? {
        let index = reader.position().unwrap_or_default();
        let size = reader.current_bytes()?.len();
        match reader.current_header() {
            Ok(header) => println!("{:>6}  {:>10} bytes  {}", index, size, header),
            Err(e) => println!("{:>6}  {:>10} bytes  <{}>", index, size, e),
        }
    }
    reader.close()?;
    Ok(())
}

fn extract_cmd(
    bundle: PathBuf,
    index: usize,
    output: PathBuf,
    registry: Arc<CodecRegistry>,
    config: &BundleConfig,
) -> Result<()> {
    let target = output
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .with_context(|| format!("cannot infer an image format from {}", output.display()))?;

    let mut reader = BundleReader::open_at_index(&bundle, index, registry.clone(), config)
        .with_context(|| format!("failed to open bundle {}", bundle.display()))?;
    if !reader.advance()? {
        bail!("bundle {} has no image {}", bundle.display(), index);
    }

    let source = reader.current_format()?;
    if source == Some(target) {
        std::fs::write(&output, reader.current_bytes()?)
            .with_context(|| format!("failed to write {}", output.display()))?;
    } else {
        let Some(image) = reader.current_image()? else {
            let reason = reader.current_error().unwrap_or("unknown error").to_string();
            error!("Image {} could not be decoded: {}", index, reason);
            bail!("image {} could not be decoded: {}", index, reason);
        };
        let file = File::create(&output)
            .with_context(|| format!("failed to create {}", output.display()))?;
        let mut out = BufWriter::new(file);
        registry.encoder(target)?.encode_image(image, &mut out)?;
        out.flush()?;
    }
    reader.close()?;

    info!("Wrote image {} to {}", index, output.display());
    Ok(())
}

fn splits_cmd(bundle: PathBuf, block_size: &str, count: &str) -> Result<()> {
    let block_size: u64 = block_size
        .parse()
        .with_context(|| format!("invalid block size '{}'", block_size))?;
    let count: usize = count
        .parse()
        .with_context(|| format!("invalid split count '{}'", count))?;

    let layout = BundleLayout::load_uniform(&bundle, block_size, &["localhost".to_string()])
        .with_context(|| format!("failed to load bundle {}", bundle.display()))?;
    if block_size == 0 {
        warn!("Block size 0, treating the data file as a single block");
    }

    let splits = compute_splits(&[layout], count)
        .with_context(|| format!("failed to plan splits for {}", bundle.display()))?;
    for (i, split) in splits.iter().enumerate() {
        println!(
            "{:>4}  [{}, {})  {} bytes  {:?}",
            i,
            split.start,
            split.end(),
            split.length,
            split.hosts
        );
    }
    Ok(())
}
