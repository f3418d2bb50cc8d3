use {
    std::{io::IsTerminal, sync::Arc},
    tokio::{
        io::BufReader,
        sync::mpsc,
        time::{interval, Duration, MissedTickBehavior},
    },
    topstat::{
        config::Config,
        parser::LineParser,
        pipeline::{
            ingestion::{ingest_lines, read_lines},
            spawn_decay_task, spawn_purge_task, Aggregator,
        },
        ui::{StdoutViewer, TerminalViewer, ViewEvent, Viewer},
    },
};

fn init_logger() {
    // Default to warn so log lines do not bleed into the terminal UI
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    init_logger();

    let config = Config::load()?;

    if std::io::stdin().is_terminal() {
        return Err("stdin can't be connected to a terminal".into());
    }

    log::info!("🚀 Starting topstat");
    log::info!("   Metrics: {:?}", config.metrics);
    log::info!("   Sort order: {}", config.effective_sort_order());
    log::info!("   Purge: {} (keep {})", config.purge, config.keep);
    log::info!("   Interval: {}s", config.interval_secs);

    let aggregator = Arc::new(Aggregator::new(config.aggregator_config()));
    let refresh = Duration::from_secs(config.interval_secs);

    let decay = spawn_decay_task(aggregator.clone());
    let purge = spawn_purge_task(aggregator.clone(), refresh);

    // stdin → line channel → ingestion
    let (line_tx, line_rx) = mpsc::channel::<String>(config.channel_buffer);
    let mut reader = tokio::spawn(read_lines(BufReader::new(tokio::io::stdin()), line_tx));
    let parser = LineParser {
        only_element: config.only_element,
        strict: config.strict,
    };
    let mut ingestion = tokio::spawn(ingest_lines(line_rx, aggregator.clone(), parser));

    let mut viewer: Box<dyn Viewer> = if config.stdout || config.stdout_once {
        Box::new(StdoutViewer::new(
            aggregator.clone(),
            config.metrics.clone(),
            config.rate_unit,
            config.format,
            config.stdout_once,
        ))
    } else {
        Box::new(TerminalViewer::new(
            aggregator.clone(),
            config.metrics.clone(),
            config.rate_unit,
        ))
    };

    let (event_tx, event_rx) = mpsc::channel::<ViewEvent>(16);
    let mut view_handle = tokio::spawn(async move { viewer.run(event_rx).await });

    let mut tick = interval(refresh);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tick.tick().await;

    let mut input_open = true;
    let mut failure: Option<Box<dyn std::error::Error>> = None;

    loop {
        tokio::select! {
            result = &mut view_handle => {
                match result {
                    Ok(Ok(())) => log::info!("Viewer exited"),
                    Ok(Err(e)) => failure = Some(Box::new(e)),
                    Err(e) => failure = Some(Box::new(e)),
                }
                break;
            }
            _ = tick.tick() => {
                let _ = event_tx.send(ViewEvent::Tick).await;
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupt received");
                let _ = event_tx.send(ViewEvent::Interrupt).await;
            }
            result = &mut ingestion, if input_open => {
                input_open = false;
                match result {
                    Ok(Ok(total)) => {
                        log::info!("Input closed ({} observations)", total);
                        // The channel also closes when the reader fails; keep
                        // showing what was read but report the error on exit
                        match (&mut reader).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => {
                                log::error!("Reading stdin failed: {}", e);
                                failure = Some(Box::new(e));
                            }
                            Err(e) => failure = Some(Box::new(e)),
                        }
                        let _ = event_tx.send(ViewEvent::PipeClosed).await;
                    }
                    Ok(Err(e)) => {
                        // Strict mode: stop the viewer, then report the bad line
                        failure = Some(Box::new(e));
                        let _ = event_tx.send(ViewEvent::Shutdown).await;
                    }
                    Err(e) => {
                        failure = Some(Box::new(e));
                        let _ = event_tx.send(ViewEvent::Shutdown).await;
                    }
                }
            }
        }
    }

    reader.abort();
    decay.stop().await;
    purge.stop().await;

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
