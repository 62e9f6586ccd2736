use std::io::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use callcount::*;
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn session(target: &str) -> (Arc<Registry>, Session, SharedBuf) {
    let registry = Arc::new(Registry::new());
    let buf = SharedBuf::default();
    let session = Session::with_sink(Arc::clone(&registry), &Config::new(target), buf.clone());
    (registry, session, buf)
}

#[test]
fn widget_render_defined_after_startup_is_counted() {
    let (registry, session, buf) = session("Widget#render");
    assert!(!session.patcher().is_patched());

    let widget = registry.define_class("Widget", None).unwrap();
    registry
        .define_method(
            &widget,
            "render",
            Method::instance(|this: &Object, (): ()| {
                format!("<widget {}>", this.state::<u32>().unwrap())
            }),
        )
        .unwrap();
    assert!(session.patcher().is_patched());

    let first = Object::new(Arc::clone(&widget), 1_u32);
    let second = Object::new(Arc::clone(&widget), 2_u32);
    assert_eq!(first.send::<(), String>("render", ()).unwrap(), "<widget 1>");
    assert_eq!(second.send::<(), String>("render", ()).unwrap(), "<widget 2>");
    assert_eq!(first.send::<(), String>("render", ()).unwrap(), "<widget 1>");

    drop(session);
    assert_eq!(buf.contents(), "Widget#render called 3 times\n");
}

#[test]
fn nested_target_waits_for_its_namespace() {
    let (registry, session, _buf) = session("Ui::Widget.build");
    registry.define_module("Ui").unwrap();
    let widget = registry.define_class("Ui::Widget", None).unwrap();
    assert!(!session.patcher().is_patched());
    registry
        .define_static(
            &widget,
            "build",
            Method::static_method(|ty: &TypeDef, (n,): (usize,)| ty.name().len() * n),
        )
        .unwrap();
    assert!(session.patcher().is_patched());

    assert_eq!(widget.send::<(usize,), usize>("build", (2,)).unwrap(), 20);
    assert_eq!(session.finish().unwrap(), "Ui::Widget.build called 1 times");
}

#[test]
fn member_arriving_through_include_is_patched() {
    let (registry, session, _buf) = session("Widget#draw");
    let widget = registry.define_class("Widget", None).unwrap();
    let drawable = registry.define_module("Drawable").unwrap();
    registry
        .define_method(&drawable, "draw", Method::instance(|_: &Object, (): ()| "drawn"))
        .unwrap();
    assert!(!session.patcher().is_patched());

    registry.include(&widget, &drawable).unwrap();
    assert!(session.patcher().is_patched());

    let obj = Object::new(widget, ());
    assert_eq!(obj.send::<(), &str>("draw", ()).unwrap(), "drawn");
    assert_eq!(session.finish().unwrap(), "Widget#draw called 1 times");
}

#[test]
fn member_arriving_through_extend_is_patched() {
    let (registry, session, _buf) = session("Widget.make");
    let widget = registry.define_class("Widget", None).unwrap();
    let factory = registry.define_module("Factory").unwrap();
    registry
        .define_static(
            &factory,
            "make",
            Method::static_method(|ty: &TypeDef, (): ()| ty.name().to_owned()),
        )
        .unwrap();
    assert!(!session.patcher().is_patched());

    registry.extend(&widget, &factory).unwrap();
    assert!(session.patcher().is_patched());

    assert_eq!(widget.send::<(), String>("make", ()).unwrap(), "Widget");
    assert_eq!(factory.send::<(), String>("make", ()).unwrap(), "Factory");
    assert_eq!(session.finish().unwrap(), "Widget.make called 1 times");
}

#[test]
fn calls_before_patching_are_not_counted() {
    let registry = Arc::new(Registry::new());
    let widget = registry.define_class("Widget", None).unwrap();
    registry
        .define_method(&widget, "render", Method::instance(|_: &Object, (): ()| ()))
        .unwrap();
    let obj = Object::new(widget, ());
    obj.send::<(), ()>("render", ()).unwrap();
    obj.send::<(), ()>("render", ()).unwrap();

    let patcher = Patcher::new(Arc::clone(&registry), &Config::new("Widget#render"));
    assert!(patcher.attempt_patch());
    obj.send::<(), ()>("render", ()).unwrap();
    assert_eq!(patcher.finalize(), "Widget#render called 1 times");
}

#[test]
fn errors_pass_through_and_are_counted() {
    let (registry, session, _buf) = session("Parser#parse");
    let parser = registry.define_class("Parser", None).unwrap();
    registry
        .define_method(
            &parser,
            "parse",
            Method::instance(|_: &Object, (input,): (&'static str,)| {
                input.parse::<i32>().map_err(|err| err.to_string())
            }),
        )
        .unwrap();

    let obj = Object::new(parser, ());
    let ok = obj
        .send::<(&'static str,), Result<i32, String>>("parse", ("42",))
        .unwrap();
    let err = obj
        .send::<(&'static str,), Result<i32, String>>("parse", ("forty",))
        .unwrap();
    assert_eq!(ok, Ok(42));
    assert_eq!(err, Err("invalid digit found in string".to_owned()));
    assert_eq!(session.finish().unwrap(), "Parser#parse called 2 times");
}

#[test]
fn panics_pass_through_and_are_counted() {
    let (registry, session, _buf) = session("Bomb#explode");
    let bomb = registry.define_class("Bomb", None).unwrap();
    registry
        .define_method(
            &bomb,
            "explode",
            Method::instance(|_: &Object, (): ()| -> () { panic!("boom") }),
        )
        .unwrap();

    let obj = Object::new(bomb, ());
    let payload = panic::catch_unwind(AssertUnwindSafe(|| obj.send::<(), ()>("explode", ())))
        .unwrap_err();
    assert_eq!(payload.downcast_ref::<&str>(), Some(&"boom"));
    assert_eq!(session.patcher().counter().get(), 1);
}

#[test]
fn unknown_target_still_reports() {
    let (registry, session, buf) = session("Ghost#haunt");
    registry.define_class("Widget", None).unwrap();
    drop(session);
    assert_eq!(buf.contents(), "Ghost#haunt called 0 times\n");
}

#[test]
fn concurrent_events_and_calls_install_once_and_lose_nothing() {
    let (registry, session, _buf) = session("Widget#tick");
    let widget = registry.define_class("Widget", None).unwrap();
    let originals = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&originals);
    registry
        .define_method(
            &widget,
            "tick",
            Method::instance(move |_: &Object, (): ()| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let widget = Arc::clone(&widget);
            thread::spawn(move || {
                let obj = Object::new(widget, ());
                for i in 0..200 {
                    if i % 20 == 0 {
                        registry
                            .define_class(&format!("Filler{t}x{i}"), None)
                            .unwrap();
                    }
                    obj.send::<(), ()>("tick", ()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(originals.load(Ordering::SeqCst), 1600);
    assert_eq!(session.finish().unwrap(), "Widget#tick called 1600 times");
}

#[test]
fn redefinition_racing_the_patch_is_kept() {
    for _ in 0..500 {
        let registry = Arc::new(Registry::new());
        let widget = registry.define_class("Widget", None).unwrap();
        let patcher = Arc::new(Patcher::new(
            Arc::clone(&registry),
            &Config::new("Widget#render"),
        ));
        patcher.attach();

        let definer = {
            let registry = Arc::clone(&registry);
            let widget = Arc::clone(&widget);
            thread::spawn(move || {
                registry
                    .define_method(&widget, "render", Method::instance(|_: &Object, (): ()| "old"))
                    .unwrap();
            })
        };
        let redefiner = {
            let registry = Arc::clone(&registry);
            let widget = Arc::clone(&widget);
            let patcher = Arc::clone(&patcher);
            thread::spawn(move || {
                while !patcher.is_patched() {
                    thread::yield_now();
                }
                registry
                    .define_method(&widget, "render", Method::instance(|_: &Object, (): ()| "new"))
                    .unwrap();
            })
        };
        definer.join().unwrap();
        redefiner.join().unwrap();

        let obj = Object::new(widget, ());
        assert_eq!(obj.send::<(), &str>("render", ()).unwrap(), "new");
    }
}

#[test]
fn dropped_sessions_leave_no_listeners() {
    let registry = Arc::new(Registry::new());
    for _ in 0..1000 {
        let session = Session::with_sink(
            Arc::clone(&registry),
            &Config::new("Widget#render"),
            io::sink(),
        );
        drop(session);
    }
    assert_eq!(registry.listener_count(), 0);
    registry.define_class("Widget", None).unwrap();
}

#[test]
fn inherited_member_is_wrapped_on_the_named_type() {
    let registry = Arc::new(Registry::new());
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    registry.subscribe(move |event: &LifecycleEvent| sink.lock().push(event.clone()));
    let buf = SharedBuf::default();
    let session = Session::with_sink(
        Arc::clone(&registry),
        &Config::new("Widget.name"),
        buf.clone(),
    );

    let widget = registry.define_class("Widget", None).unwrap();
    let fancy = registry.define_class("Fancy", Some(&widget)).unwrap();
    assert!(session.patcher().is_patched());
    assert!(events.lock().contains(&LifecycleEvent::StaticMethodAdded {
        owner: "Widget".to_owned(),
        member: "name".to_owned(),
    }));

    let object = Arc::clone(registry.object_class());
    assert_eq!(object.send::<(), String>("name", ()).unwrap(), "Object");
    assert_eq!(widget.send::<(), String>("name", ()).unwrap(), "Widget");
    assert_eq!(fancy.send::<(), String>("name", ()).unwrap(), "Fancy");
    assert_eq!(object.send::<(), String>("name", ()).unwrap(), "Object");
    assert_eq!(session.patcher().counter().get(), 1);

    // Object's own member is still the unwrapped original.
    let other = Patcher::new(Arc::clone(&registry), &Config::new("Object.name"));
    assert!(other.attempt_patch());
    object.send::<(), String>("name", ()).unwrap();
    assert_eq!(other.finalize(), "Object.name called 1 times");

    drop(session);
    assert_eq!(buf.contents(), "Widget.name called 1 times\n");
}

#[test]
fn target_with_extra_separators_is_wrapped_but_never_counted() {
    let (registry, session, _buf) = session("Widget.build.now");
    let widget = registry.define_class("Widget", None).unwrap();
    registry
        .define_static(&widget, "build", Method::static_method(|_: &TypeDef, (): ()| 5))
        .unwrap();
    assert!(session.patcher().is_patched());

    assert_eq!(widget.send::<(), i32>("build", ()).unwrap(), 5);
    assert_eq!(session.finish().unwrap(), "Widget.build.now called 0 times");
}
