use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exprviz_core::{
    vec3, AppConfig, ControlPanel, Delegate, Expression, Figure, HeadlessBackend, HostArray,
    InstanceBuffer, LineDelegate, Slider, SphereDelegate, UniformBuffer, UniformFieldDecl,
};
use tracing_subscriber::EnvFilter;

fn main() -> exprviz_core::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    init_tracing(&config.logging.filter);

    match cli.command {
        Commands::Controls { count, frames } => {
            if let Some(frames) = frames {
                config.figure.frames = frames;
            }
            run_controls(&config, count)
        }
        Commands::Polyhedron => run_polyhedron(&config),
        Commands::Inspect { count } => run_inspect(count),
    }
}

fn declare_parameters(backend: &mut HeadlessBackend) -> exprviz_core::Result<UniformBuffer> {
    UniformBuffer::declare(
        backend,
        "Parameters",
        &[
            UniformFieldDecl::float("a", 0.0),
            UniformFieldDecl::float("b", 0.0),
            UniformFieldDecl::float("c", 0.0),
            UniformFieldDecl::float("radius", 0.2),
        ],
    )
}

/// Particle positions along a curve whose three frequencies follow the
/// `a`, `b` and `c` parameters.
fn create_particles(
    t: &Expression,
    a: &Expression,
    b: &Expression,
    c: &Expression,
) -> exprviz_core::Result<Expression> {
    let a = 10.0_f32 * a.cos();
    let b = 100.0_f32 * b.sin();
    let c = 50.0_f32 * c.cos();
    let x = (&a * t).cos() + (&b * t).cos() / 2.0_f32 + (&c * t).sin() / 3.0_f32;
    let y = (&a * t).sin() + (&b * t).sin() / 2.0_f32 + (&c * t).cos() / 3.0_f32;
    Ok(10.0_f32 * vec3(x, y, t)?)
}

fn particle_spheres(
    backend: &mut HeadlessBackend,
    parameters: &UniformBuffer,
    count: usize,
) -> exprviz_core::Result<SphereDelegate> {
    let fields = parameters.instance()?;
    let field = |name: &str| -> exprviz_core::Result<Expression> {
        fields
            .get(name)
            .map(Expression::from)
            .ok_or_else(|| exprviz_core::ExprVizError::msg(format!("missing parameter `{name}`")))
    };

    let t = InstanceBuffer::new(
        backend,
        "t",
        &HostArray::linspace(0.0, 3.14 * count as f64 / 1000.0, count),
    )?
    .expression();
    let position = create_particles(&t, &field("a")?, &field("b")?, &field("c")?)?;
    let color = 1.0_f32 * &position / 4.0_f32 + 8.0_f32 / 3.0_f32;

    SphereDelegate::new(&position, field("radius")?, color)
}

fn run_controls(config: &AppConfig, count: usize) -> exprviz_core::Result<()> {
    tracing::info!(count, frames = config.figure.frames, "starting controls scene");

    let mut backend = HeadlessBackend::from_config(&config.figure);
    let mut parameters = declare_parameters(&mut backend)?;
    let spheres = particle_spheres(&mut backend, &parameters, count)?;

    let mut controls = ControlPanel::with_sliders(vec![
        Slider::new("a", 0.0, 0.0, 1.0, 0.1),
        Slider::new("b", 0.0, 0.0, 1.0, 0.1),
        Slider::new("c", 0.0, 0.0, 1.0, 0.1),
        Slider::new("radius", 0.2, 0.0, 1.0, 0.01),
    ]);

    let summary = Figure::new(config.figure.clone()).show(
        &mut backend,
        &[spheres.into()],
        &mut controls,
        |frame| {
            // Stand-in for a user dragging the frequency sliders.
            for name in ["a", "b", "c"] {
                if let Some(slider) = frame.controls.get_mut(name) {
                    slider.nudge(1.0);
                }
            }
            let applied = parameters.apply_updates(&frame.controls.updates());
            tracing::trace!(frame = frame.index, applied, "applied slider values");
            parameters.update(frame.backend)?;
            tracing::debug!(frame = frame.index, bytes = ?parameters.bytes(), "pushed parameters");
            Ok(())
        },
    )?;

    tracing::info!(
        frames = summary.frames_drawn,
        failures = summary.update_failures + summary.draw_failures,
        writes = backend.write_count(),
        "controls scene finished"
    );
    Ok(())
}

fn icosahedron() -> (Vec<[f32; 3]>, Vec<([f32; 3], [f32; 3])>) {
    let phi = (1.0 + 5.0_f32.sqrt()) / 2.0;
    let mut vertices = Vec::with_capacity(12);
    for a in [-1.0, 1.0] {
        for b in [-phi, phi] {
            vertices.push([0.0, a, b]);
            vertices.push([a, b, 0.0]);
            vertices.push([b, 0.0, a]);
        }
    }

    let mut edges = Vec::with_capacity(30);
    for (i, start) in vertices.iter().enumerate() {
        for end in &vertices[i + 1..] {
            let distance: f32 = start
                .iter()
                .zip(end)
                .map(|(s, e)| (s - e) * (s - e))
                .sum();
            if (distance - 4.0).abs() < 1e-3 {
                edges.push((*start, *end));
            }
        }
    }
    (vertices, edges)
}

fn run_polyhedron(config: &AppConfig) -> exprviz_core::Result<()> {
    let (vertices, edges) = icosahedron();
    tracing::info!(vertices = vertices.len(), edges = edges.len(), "starting polyhedron scene");

    let mut backend = HeadlessBackend::from_config(&config.figure);
    let mut parameters = UniformBuffer::declare(
        &mut backend,
        "Style",
        &[UniformFieldDecl::float("radius", 0.15), UniformFieldDecl::float("width", 0.05)],
    )?;

    let positions =
        InstanceBuffer::new(&mut backend, "vertices", &HostArray::from_rows(&vertices)?)?;
    let starts: Vec<[f32; 3]> = edges.iter().map(|(start, _)| *start).collect();
    let ends: Vec<[f32; 3]> = edges.iter().map(|(_, end)| *end).collect();
    let starts =
        InstanceBuffer::new(&mut backend, "edge_start", &HostArray::from_rows(&starts)?)?;
    let ends = InstanceBuffer::new(&mut backend, "edge_end", &HostArray::from_rows(&ends)?)?;

    let spheres = SphereDelegate::new(
        &positions,
        parameters.field("radius")?,
        0.5_f32 * positions.expression() + 0.5_f32,
    )?;
    let lines = LineDelegate::new(
        &starts,
        &ends,
        parameters.field("width")?,
        [0.8_f32, 0.8, 0.8],
    )?
    .with_alpha(0.6)?;
    let delegates: Vec<Delegate> = vec![spheres.into(), lines.into()];

    let mut controls =
        ControlPanel::with_sliders(vec![Slider::new("radius", 0.15, 0.05, 0.5, 0.05)]);
    let summary = Figure::new(config.figure.clone()).show(
        &mut backend,
        &delegates,
        &mut controls,
        |frame| {
            if let Some(slider) = frame.controls.get_mut("radius") {
                slider.nudge(if frame.index % 10 < 5 { 1.0 } else { -1.0 });
            }
            parameters.apply_updates(&frame.controls.updates());
            parameters.update(frame.backend)
        },
    )?;

    tracing::info!(frames = summary.frames_drawn, "polyhedron scene finished");
    Ok(())
}

fn run_inspect(count: usize) -> exprviz_core::Result<()> {
    let mut backend = HeadlessBackend::new();
    let parameters = declare_parameters(&mut backend)?;
    let spheres = particle_spheres(&mut backend, &parameters, count)?;

    let layout = parameters.layout();
    println!("struct {} ({} bytes)", parameters.struct_name(), layout.size());
    for field in layout.fields() {
        println!("  {:>3}  {}: {}", field.offset, field.name, field.ty);
    }

    let descriptor = spheres.descriptor();
    println!("{:?} x {}", descriptor.kind, descriptor.instance_count()?);
    for binding in &descriptor.slots {
        println!("  {} = {}", binding.slot.name(), binding.expression);
    }
    if count > 0 {
        println!("position[0] = {:?}", spheres.position.evaluate(0)?);
    }
    Ok(())
}

fn init_tracing(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless expression-graph visualiser", long_about = None)]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Particle curve whose shape follows four sliders.
    Controls {
        /// Number of particles.
        #[arg(short = 'n', long, default_value_t = 100_000)]
        count: usize,
        /// Overrides the configured frame count.
        #[arg(short, long)]
        frames: Option<u64>,
    },
    /// Icosahedron drawn with spheres at the vertices and lines along the edges.
    Polyhedron,
    /// Print the uniform layout and slot graphs of the particle scene.
    Inspect {
        #[arg(short = 'n', long, default_value_t = 4)]
        count: usize,
    },
}
