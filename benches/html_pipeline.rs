use criterion::{criterion_group, criterion_main, Criterion};
use dashshot::{rewrite_static_paths, AssetConfig, Component, StandaloneHtml};

fn dashboard(rows: usize) -> Component {
    let mut children: Vec<Component> = vec!["# Bench Dashboard".into()];
    for i in 0..rows {
        children.push(Component::row(vec![
            Component::slider(format!("Value {}", i), 0.0, 10.0, (i % 10) as f64),
            Component::text_input("Name", format!("row {}", i), "Enter something..."),
            Component::markdown(format!("**row {}**: {}", i, i % 10)),
        ]));
    }
    Component::column(children)
}

fn bench_serialize(c: &mut Criterion) {
    let assets = AssetConfig::default();
    let tree = dashboard(200);

    c.bench_function("serialize_standalone_200_rows", |b| {
        b.iter(|| {
            let _ = tree.to_standalone_html(&assets).unwrap();
        })
    });
}

fn bench_rewrite(c: &mut Criterion) {
    let assets = AssetConfig::default();
    // Many references, as in a page saved with per-widget stylesheets
    let mut html = dashboard(50).to_standalone_html(&assets).unwrap();
    for i in 0..200 {
        html.push_str(&format!(
            r#"<link rel="stylesheet" href="{}">"#,
            assets.relative_ref(&format!("css/widget_{}.css", i))
        ));
    }

    c.bench_function("rewrite_static_paths_200_refs", |b| {
        b.iter(|| {
            let _ = rewrite_static_paths(&html, &assets).unwrap();
        })
    });
}

criterion_group!(benches, bench_serialize, bench_rewrite);
criterion_main!(benches);
