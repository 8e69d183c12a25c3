use serial_test::serial;
use sovran_sheet::{
    global, BoundedFactory, Dispose, GlobalConfig, ObservableSheet, RefSheet, SheetError,
    ValueSheet,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

struct Polite;

impl Greeter for Polite {
    fn greet(&self, name: &str) -> String {
        format!("Good day, {}", name)
    }
}

struct Pool {
    closed: Arc<AtomicUsize>,
}

impl Dispose for Pool {
    fn dispose(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
#[serial]
fn test_unconfigured_access_fails() {
    global::reset();
    assert!(!global::is_configured());

    assert!(matches!(
        global::read_value::<i32>(),
        Err(SheetError::NotConfigured)
    ));
    assert!(matches!(
        global::write_value(1i32),
        Err(SheetError::NotConfigured)
    ));
    assert!(matches!(
        global::get_ref::<String>(),
        Err(SheetError::NotConfigured)
    ));
    assert!(global::values().is_err_and(|e| e.is_invalid_operation()));
    assert!(global::refs().is_err_and(|e| e.is_invalid_operation()));
    assert!(global::on_write(|_: &i32| {}).is_err());
}

#[test]
#[serial]
fn test_configure_twice_fails() -> Result<(), SheetError> {
    global::reset();
    global::configure(GlobalConfig::default())?;
    global::write_value(5u8)?;

    let err = global::configure(GlobalConfig::default()).unwrap_err();
    assert!(matches!(err, SheetError::AlreadyConfigured));

    // The existing state survives the rejected configure
    assert_eq!(global::read_value::<u8>()?, 5);
    global::reset();
    Ok(())
}

#[test]
#[serial]
fn test_reset_discards_state() -> Result<(), SheetError> {
    global::reset();
    global::configure(GlobalConfig::default())?;

    global::write_value(42i32)?;
    global::write_keyed_value("pi".to_string(), 3.14f64)?;
    assert_eq!(global::read_value::<i32>()?, 42);
    assert_eq!(
        global::read_keyed_value::<String, f64>(&"pi".to_string())?,
        3.14
    );
    assert!(global::has_keyed_value::<String, f64>(&"pi".to_string())?);

    global::reset();
    assert!(global::read_value::<i32>().is_err());

    global::configure(GlobalConfig::default())?;
    assert_eq!(global::read_value::<i32>()?, 0);
    assert!(!global::has_value::<i32>()?);
    assert!(!global::has_keyed_value::<String, f64>(&"pi".to_string())?);
    global::reset();
    Ok(())
}

#[test]
#[serial]
fn test_reset_when_unconfigured_is_noop() {
    global::reset();
    global::reset();
    assert!(!global::is_configured());
}

#[test]
#[serial]
fn test_references() -> Result<(), SheetError> {
    global::reset();
    global::configure(GlobalConfig::default())?;

    assert!(global::get_ref::<dyn Greeter>().is_err_and(|e| e.is_not_found()));
    assert!(!global::has_ref::<dyn Greeter>()?);

    global::set_ref::<dyn Greeter>(Some(Arc::new(Polite)))?;
    assert_eq!(global::get_ref::<dyn Greeter>()?.greet("Ada"), "Good day, Ada");

    global::set_keyed_ref::<&str, dyn Greeter>("formal", Some(Arc::new(Polite)))?;
    assert!(global::has_keyed_ref::<&str, dyn Greeter>(&"formal")?);
    assert!(global::get_keyed_ref::<&str, dyn Greeter>(&"casual").is_err());

    global::set_ref::<dyn Greeter>(None)?;
    assert!(!global::has_ref::<dyn Greeter>()?);
    global::reset();
    Ok(())
}

#[test]
#[serial]
fn test_custom_config() -> Result<(), SheetError> {
    global::reset();
    let config = GlobalConfig::default()
        .with_values(ObservableSheet::new(ValueSheet::with_factory(
            BoundedFactory::new(1)?,
        )))
        .with_refs(RefSheet::new());
    global::configure(config)?;

    global::write_keyed_value(1u32, "first".to_string())?;
    global::write_keyed_value(2u32, "second".to_string())?;
    assert!(!global::has_keyed_value::<u32, String>(&1)?);
    assert_eq!(global::read_keyed_value::<u32, String>(&2)?, "second");
    global::reset();
    Ok(())
}

#[test]
#[serial]
fn test_reset_disposes_references() -> Result<(), SheetError> {
    global::reset();
    global::configure(GlobalConfig::default())?;

    let closed = Arc::new(AtomicUsize::new(0));
    global::refs()?.set_disposable(Some(Arc::new(Pool {
        closed: Arc::clone(&closed),
    })));
    assert_eq!(closed.load(Ordering::SeqCst), 0);

    global::reset();
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
#[serial]
fn test_observers_through_global() -> Result<(), SheetError> {
    global::reset();
    global::configure(GlobalConfig::default())?;

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let _writes = global::on_write(move |value: &i32| {
        sink.lock().unwrap().push(format!("write {}", value));
    })?;
    let sink = Arc::clone(&log);
    let _reads = global::on_read(move |value: &i32| {
        sink.lock().unwrap().push(format!("read {}", value));
    })?;
    let sink = Arc::clone(&log);
    let _pi = global::on_key_write("pi".to_string(), move |key: &String, value: &f64| {
        sink.lock().unwrap().push(format!("{} = {}", key, value));
    })?;
    let sink = Arc::clone(&log);
    let _any = global::on_keyed_read(move |key: &String, _: &f64| {
        sink.lock().unwrap().push(format!("read {}", key));
    })?;

    global::write_value(42i32)?;
    global::read_value::<i32>()?;
    global::write_keyed_value("e".to_string(), 2.71f64)?;
    global::write_keyed_value("pi".to_string(), 3.14f64)?;
    global::read_keyed_value::<String, f64>(&"e".to_string())?;

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "write 42".to_string(),
            "read 42".to_string(),
            "pi = 3.14".to_string(),
            "read e".to_string(),
        ]
    );
    global::reset();
    Ok(())
}

#[test]
#[serial]
fn test_reset_deactivates_subscriptions() -> Result<(), SheetError> {
    global::reset();
    global::configure(GlobalConfig::default())?;

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let subscription = global::on_keyed_write(move |_: &u8, _: &u8| {
        counter.fetch_add(1, Ordering::SeqCst);
    })?;
    global::write_keyed_value(1u8, 1u8)?;

    global::reset();
    assert!(!subscription.is_active());

    global::configure(GlobalConfig::default())?;
    global::write_keyed_value(1u8, 2u8)?;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(subscription);
    global::reset();
    Ok(())
}
