// =============================================================================
// ENTRY POINT
// =============================================================================
//
// FLOW:
// 1. Parse CLI, load config.toml, install logging
// 2. Create the window
// 3. Bootstrap every Vulkan object
// 4. Run frames until the window closes
// 5. Tear down in reverse order, then destroy the window
//
// Any error is logged and returned from main, so the process exits non-zero.
//
// =============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use triangle_renderer::logging::{self, LIFECYCLE};
use triangle_renderer::{
    config::Config, frame::FrameScheduler, GraphicsContext, VulkanDriver, WinitWindow,
};

#[derive(Debug, Parser)]
#[command(version, about = "Clears the screen and draws one triangle with Vulkan")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // The logger depends on the config, so the load outcome is reported after
    let (config, source) = Config::load(&cli.config);
    logging::init(&config.debug);
    source.report();
    log::debug!("Config: {:?}", config);

    log::info!("Starting triangle renderer");
    log::info!(
        "Window: {}x{}, {} swapchain images requested",
        config.window.width,
        config.window.height,
        config.graphics.image_count
    );

    // The failing call already logged the error itself
    let result = run(&config);
    if let Err(e) = &result {
        log::info!(target: LIFECYCLE, "Stopped by a fatal error: {:#}", e);
    }
    result
}

fn run(config: &Config) -> Result<()> {
    let mut window = WinitWindow::new(&config.window).context("Failed to create window")?;

    let driver = VulkanDriver::new().context("Failed to load Vulkan library. Is Vulkan installed?")?;
    let mut context = GraphicsContext::bootstrap(driver, &window, config)
        .context("Failed to initialize Vulkan")?;

    let frames = FrameScheduler::new().run(&mut context, &mut window);

    // Teardown happens whether or not the loop failed
    let shutdown = context.shutdown();
    let stats = frames.context("Frame loop failed")?;
    shutdown.context("Failed to wait for the GPU before teardown")?;

    log::info!("Rendered {} frames", stats.frames);
    drop(window);
    Ok(())
}
