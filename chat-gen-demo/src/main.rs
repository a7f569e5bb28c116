use chat_gen_core::quotation::CorpusCatalog;
use chat_gen_core::scheduler::Action;
use chat_gen_core::settings::EngineSettings;
use chat_gen_core::{ActionOutcome, Engine, IncomingMessage};
use chrono::{Duration, Utc};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // Load every .json corpus from the "data" directory
    // Each file becomes one selectable corpus, described by its name
    let catalog = CorpusCatalog::discover("./data")?;
    println!("Corpora: {}", catalog.descriptions().join(", "));

    // Default settings: idle 66, quote 3, generate 30, 30 seconds between actions
    let mut engine = Engine::new(catalog, EngineSettings::default());
    let chat = 1;

    let lines = [
        "Товарищи, сегодня обсуждаем революцию и массы",
        "Массы всегда правы, товарищи",
        "Революция требует исследования",
        "Я хочу учиться и учить массы",
        "Я хочу спать, а не исследовать",
    ];

    // Pretend every message arrives one minute after the previous one,
    // so the minimum interval never gets in the way
    let start = Utc::now();
    for (i, line) in lines.iter().enumerate() {
        let message = IncomingMessage {
            id: i as i64 + 1,
            text: line.to_string(),
            forwarded: false,
        };
        engine.ingest(chat, &message);

        let now = start + Duration::minutes(i as i64);
        match engine.maybe_act(chat, now)? {
            ActionOutcome::None => println!("[{}] (silence)", message.id),
            outcome => print_outcome(&outcome),
        }
    }

    // Make quotes the only possible action and ask again
    engine.set_coefficient(chat, Action::Quote, 1)?;
    engine.set_coefficient(chat, Action::Idle, 0)?;
    engine.set_coefficient(chat, Action::Generate, 0)?;
    engine.set_shorten(chat, true);
    let outcome = engine.maybe_act(chat, start + Duration::hours(1))?;
    print_outcome(&outcome);

    // Ask for a quote about specific words, ignoring the conversation
    let words = vec!["учиться".to_string()];
    print_outcome(&engine.force_quote(chat, Some(&words))?);

    // Asking for a corpus that does not exist is refused
    match engine.select_corpus(chat, 99) {
        Ok(_) => println!("Should not happen"),
        Err(e) => println!("{e}"),
    }

    println!("Settings: {:?}", engine.settings(chat)?);
    Ok(())
}

fn print_outcome(outcome: &ActionOutcome) {
    let kind = match outcome {
        ActionOutcome::None => "none",
        ActionOutcome::Quote(_) => "quote",
        ActionOutcome::Generated(_) => "generated",
        ActionOutcome::Notice(_) => "notice",
    };
    match outcome.reply() {
        Some(reply) => println!("--- {kind} (reply to {:?}) ---\n{}\n", reply.reply_to, reply.text),
        None => println!("--- {kind} ---"),
    }
}
