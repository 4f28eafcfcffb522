use exprviz_core::{
    expression::NodeKind, vec3, ControlPanel, ExprVizError, Expression, Figure, FigureConfig,
    HeadlessBackend, HostArray, InstanceBuffer, Shape, Slider, SphereDelegate, UniformBuffer,
    UniformFieldDecl,
};

fn parameters(backend: &mut HeadlessBackend) -> UniformBuffer {
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
    .unwrap()
}

fn f32_at(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

#[test]
fn uniform_values_reach_the_device_buffer() {
    let mut backend = HeadlessBackend::new();
    let mut params = parameters(&mut backend);

    params.set("a", 1.0).unwrap();
    params.update(&mut backend).unwrap();

    let bytes = backend.buffer_bytes(params.handle()).unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(f32_at(bytes, 0), 1.0);
    assert_eq!(f32_at(bytes, 12), 0.2);

    let a = params.field("a").unwrap();
    assert_eq!(Expression::from(&a).evaluate(0).unwrap(), vec![1.0]);
}

#[test]
fn composed_vector_shares_its_instance_leaf() {
    let mut backend = HeadlessBackend::new();
    let t = InstanceBuffer::new(&mut backend, "t", &HostArray::column(vec![0.0, 1.0, 2.0]))
        .unwrap();

    let position = vec3(t.expression().cos(), t.expression().sin(), &t).unwrap();
    let components = match position.kind() {
        NodeKind::Compose(components) => components.clone(),
        other => panic!("expected a composed vector, got {other:?}"),
    };
    assert_eq!(components.len(), 3);

    let leaf = t.expression();
    assert!(components[0].children()[0].ptr_eq(&leaf));
    assert!(components[1].children()[0].ptr_eq(&leaf));
    assert!(components[2].ptr_eq(&leaf));

    assert_eq!(position.shape(), Shape::Vector(3));
    assert_eq!(position.instance_count().unwrap(), 3);
    let last = position.evaluate(2).unwrap();
    assert!((last[0] - 2.0_f32.cos()).abs() < 1e-6);
    assert!((last[1] - 2.0_f32.sin()).abs() < 1e-6);
    assert_eq!(last[2], 2.0);
}

#[test]
fn instance_data_round_trips_through_the_backend() {
    let mut backend = HeadlessBackend::new();
    let rows = [[1.0_f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
    let buffer =
        InstanceBuffer::new(&mut backend, "positions", &HostArray::from_rows(&rows).unwrap())
            .unwrap();

    assert_eq!(buffer.stride(), 12);
    let bytes = backend.buffer_bytes(buffer.handle()).unwrap();
    let values: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn figure_survives_a_failing_update() {
    let mut backend = HeadlessBackend::new();
    let mut params = parameters(&mut backend);
    let t = InstanceBuffer::new(&mut backend, "t", &HostArray::linspace(0.0, 3.14, 10)).unwrap();
    let a = Expression::from(params.field("a").unwrap());
    let position = vec3((&a * t.expression()).cos(), t.expression().sin(), &t).unwrap();
    let spheres = SphereDelegate::new(&position, params.field("radius").unwrap(), [1.0_f32; 3])
        .unwrap();

    let mut controls = ControlPanel::with_sliders(vec![Slider::new("a", 0.0, 0.0, 1.0, 0.1)]);
    let config = FigureConfig {
        frames: 5,
        ..FigureConfig::default()
    };

    let summary = Figure::new(config)
        .show(&mut backend, &[spheres.into()], &mut controls, |frame| {
            if frame.index == 2 {
                return Err(ExprVizError::msg("simulated callback failure"));
            }
            if let Some(slider) = frame.controls.get_mut("a") {
                slider.nudge(1.0);
            }
            params.apply_updates(&frame.controls.updates());
            params.update(frame.backend)
        })
        .unwrap();

    assert_eq!(summary.frames_drawn, 4);
    assert_eq!(summary.update_failures, 1);
    assert_eq!(backend.frames_drawn(), 4);
    assert_eq!(backend.compiled().len(), 1);

    let a_value = f32_at(&params.bytes(), 0);
    assert!((a_value - 0.4).abs() < 1e-6);
}
