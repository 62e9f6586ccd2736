use std::env;
use std::sync::Arc;

use callcount::*;
use tracing_subscriber::EnvFilter;

struct Label(&'static str);

#[method("Widget#render")]
fn render(this: &Object) -> String {
    let label = this.state::<Label>().map_or("?", |l| l.0);
    format!("[{label}]")
}

#[method("Widget.create")]
fn create(ty: &TypeDef, label: &'static str) -> String {
    format!("{ty}({label})")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match env::var_os(TARGET_ENV) {
        Some(_) => Config::from_env(),
        None => Config::new("Widget#render"),
    };
    let registry = Arc::new(Registry::new());
    let session = Session::start(Arc::clone(&registry), &config);

    // Nothing named Widget exists until now.
    let widget = registry.define_class("Widget", None)?;
    registry.define(&render)?;
    registry.define(&create)?;

    let first = Object::new(Arc::clone(&widget), Label("first"));
    let second = Object::new(Arc::clone(&widget), Label("second"));
    for obj in [&first, &second, &first] {
        let out = obj.send::<(), String>("render", ())?;
        tracing::debug!(%out, "rendered");
    }
    widget.send::<(&'static str,), String>("create", ("third",))?;

    session.finish()?;
    Ok(())
}
