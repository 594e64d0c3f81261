use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tcnet_ltc::core::NodeConfig;
use tcnet_ltc::network::{SystemSocket, SystemTransport};
use tcnet_ltc::store::{FileConfigStore, LtcSource, LtcStore};
use tcnet_ltc::sync::{Engine, MidiTimeCode, TcNetReader};
use tcnet_ltc::time::{self, Clock, SystemClock};
use tracing::info;

fn main() -> tcnet_ltc::Result<()> {
    tracing_subscriber::fmt::init();

    // Optional JSON node configuration and parameter store path
    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => NodeConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => NodeConfig::default(),
    };
    let store_path = args.next().unwrap_or_else(|| "ltc-params.bin".to_string());

    let mut store = FileConfigStore::open(&store_path)?;
    let source = LtcStore::load_source(&store)?;
    info!(?source, "Persisted LTC source");
    if source != Some(LtcSource::TcNet) {
        LtcStore::save_source(&mut store, LtcSource::TcNet)?;
    }

    let transport = SystemTransport::new();
    let clock = SystemClock::new();
    let mut engine = Engine::new(config.engine, transport, clock);

    let reader = Rc::new(RefCell::new(TcNetReader::<SystemSocket>::new(&config.reader)));
    reader.borrow_mut().add_sink(|mtc: &MidiTimeCode| {
        info!(
            "MTC {:02}:{:02}:{:02}:{:02} full frame {:02X?}",
            mtc.hours,
            mtc.minutes,
            mtc.seconds,
            mtc.frames,
            mtc.full_frame()
        );
    });
    engine.set_timecode_handler(&reader);

    engine.start()?;
    reader.borrow_mut().start(&transport)?;

    let ltc = time::runtime();
    let started = Instant::now();
    while started.elapsed() < Duration::from_secs(30) {
        engine.run();
        reader.borrow_mut().run(&mut engine);
        if let Some(ups) = ltc.run(clock.millis()) {
            info!(ups, drift = ltc.drift(), "LTC rate");
        }
        while store.flush()? {}
        std::thread::sleep(Duration::from_millis(1));
    }

    let stats = serde_json::to_string(engine.stats()).unwrap_or_default();
    info!(peers = engine.peers().len(), %stats, "Shutting down");
    reader.borrow_mut().stop();
    engine.stop();
    Ok(())
}
