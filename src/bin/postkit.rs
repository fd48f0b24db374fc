use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use postkit::post_effect::builtin::{
    ClampToneMapper, DepthFog, ExposureToneMapper, Gamma, GaussianBlur, ReinhardToneMapper,
};
use postkit::{
    AsyncRenderContext, Config, CreationFlags, ExecuteOpts, ExecutionContext, ParamStore,
    ParamValue, PixelSize, PostEffectCollection, RenderSession, RenderSettings, RenderStatus,
    RendererRegistry, ScanlineRendererOpts,
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

const GRADIENT_ENGINE: Uuid = Uuid::from_u128(0x0b5e_41c2_7d0a_4c55_8e3f_2f6a_1c9d_e001);
const SUN_ENGINE: Uuid = Uuid::from_u128(0x0b5e_41c2_7d0a_4c55_8e3f_2f6a_1c9d_e002);

#[derive(Parser, Debug)]
#[command(name = "postkit", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a frame with the sample renderer, post-process it and write a PNG.
    Render(RenderArgs),
    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Source {
    Gradient,
    Sun,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ToneMapper {
    Clamp,
    Reinhard,
    Exposure,
}

impl ToneMapper {
    fn id(self) -> Uuid {
        match self {
            Self::Clamp => ClampToneMapper::ID,
            Self::Reinhard => ReinhardToneMapper::ID,
            Self::Exposure => ExposureToneMapper::ID,
        }
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Frame width in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,

    /// Frame height in pixels.
    #[arg(long, default_value_t = 180)]
    height: u32,

    /// Pixel source of the sample renderer.
    #[arg(long, value_enum, default_value_t = Source::Sun)]
    source: Source,

    /// Tone mapper to select.
    #[arg(long, value_enum, default_value_t = ToneMapper::Reinhard)]
    tone_mapper: ToneMapper,

    /// Display gamma override.
    #[arg(long)]
    gamma: Option<f32>,

    /// Blur radius in pixels; 0 leaves the blur off.
    #[arg(long, default_value_t = 0)]
    blur: u32,

    /// Enable depth fog (needs a source with depth).
    #[arg(long, default_value_t = false)]
    fog: bool,

    /// Post-effect settings JSON, applied before the command-line overrides.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up on the renderer after this many seconds.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&Config::default())?);
            Ok(())
        }
    }
}

fn renderers(opts: &ScanlineRendererOpts) -> anyhow::Result<RendererRegistry> {
    let reg = RendererRegistry::new();
    let gradient = opts.clone();
    reg.register(
        GRADIENT_ENGINE,
        "scan-line gradient",
        Box::new(move || -> Box<dyn AsyncRenderContext> {
            Box::new(postkit::ScanlineRenderer::new(
                postkit::GradientSource,
                gradient.clone(),
            ))
        }),
    )?;
    let sun = opts.clone();
    reg.register(
        SUN_ENGINE,
        "scan-line HDR sun",
        Box::new(move || -> Box<dyn AsyncRenderContext> {
            Box::new(postkit::ScanlineRenderer::new(
                postkit::HdrSunSource::default(),
                sun.clone(),
            ))
        }),
    )?;
    Ok(reg)
}

fn effect_settings(args: &RenderArgs) -> anyhow::Result<RenderSettings> {
    let mut settings = match &args.settings {
        Some(path) => RenderSettings::load(path)?,
        None => RenderSettings::new(),
    };
    let mut set = |id: Uuid, key: &str, value: ParamValue| {
        settings.set_parameter(&format!("{id}/{key}"), value);
    };
    if let Some(g) = args.gamma {
        set(Gamma::ID, "gamma", g.into());
    }
    if args.blur > 0 {
        set(GaussianBlur::ID, "on", true.into());
        set(GaussianBlur::ID, "radius", args.blur.into());
    }
    if args.fog {
        set(DepthFog::ID, "on", true.into());
    }
    Ok(settings)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let cfg = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };

    let engine = match args.source {
        Source::Gradient => GRADIENT_ENGINE,
        Source::Sun => SUN_ENGINE,
    };
    let renderer = renderers(&cfg.renderer)?
        .create(engine)
        .context("render engine not registered")?;
    let mut session = RenderSession::new(
        engine,
        "postkit-cli",
        PixelSize::new(args.width, args.height),
        renderer,
        cfg.session.clone(),
    )?;

    session.start_rendering()?;
    let status = session.wait_for_terminal(Duration::from_secs(args.timeout_secs));
    if status != RenderStatus::Completed {
        session.stop_rendering();
        anyhow::bail!(
            "rendering did not complete: {:?}{}",
            session.status(),
            session
                .error()
                .map(|e| format!(" ({e})"))
                .unwrap_or_default()
        );
    }

    let mut effects = PostEffectCollection::with_builtins();
    effects.load_state(&effect_settings(&args)?)?;
    effects.select_tone_mapper(args.tone_mapper.id())?;

    let report = session.run_post_effects(
        &effects,
        ExecutionContext::Production,
        CreationFlags::empty(),
        cfg.pipeline.clone(),
        &ExecuteOpts::default(),
    )?;
    tracing::info!(executed = report.executed.len(), clamped = report.clamped, "post-processed");

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let img = session.frame_buffer().to_rgba8_image()?;
    img.save_with_format(&args.out, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", args.out.display()))?;

    session.delete();
    eprintln!(
        "wrote {} ({} effects, {:.0?})",
        args.out.display(),
        report.executed.len(),
        session.elapsed()
    );
    Ok(())
}
