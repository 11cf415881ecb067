#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use graphwalk::{Config, GraphSeed, GraphSession, TraversalKind};
    use wasm_bindgen_test::*;

    #[wasm_bindgen_test]
    fn test_session_render() {
        let session = GraphSession::new(Config::default()).expect("Failed to build session");
        let svg = session.render_svg("white").expect("Failed to render SVG");

        assert!(svg.contains("<svg"));
        assert!(svg.contains("viewBox"));
        assert_eq!(svg.matches("<circle").count(), 22);
    }

    #[wasm_bindgen_test]
    fn test_traversal_without_timers() {
        let mut session = GraphSession::with_seed(
            Config::default(),
            GraphSeed::new(1..=4, &[(1, 2), (2, 3), (3, 4)]),
        )
        .expect("Failed to build session");
        let generation = session
            .start_traversal_from(TraversalKind::Dfs, 1)
            .expect("Failed to start traversal");

        let steps = session.drive(generation, |_, _| {});
        assert_eq!(steps, 4);
        assert_eq!(session.traversal().visited().len(), 4);
    }

    #[wasm_bindgen_test]
    fn test_minimal_graph() {
        let session = GraphSession::with_seed(Config::default(), GraphSeed::new(1..=1, &[]))
            .expect("Failed to build minimal session");
        let svg = session.render_svg("white").expect("Failed to render minimal SVG");

        assert!(svg.contains("<svg"));
        assert!(svg.contains(">1</text>"));
    }
}
