use std::{
    io::{self, BufRead, Read, Write},
    sync::Arc,
};

use clap::Parser;
use common::{
    corpus,
    error::AppError,
    storage::db::SurrealDbClient,
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{adhoc_index_from_text, adhoc_index_from_url, IngestionPipeline};
use quiz_pipeline::{
    AnswerGenerator, ChatLog, ChatModel, ConversationChain, OpenAiChatModel, QuestionGenerator,
    TurnRole,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Question/answer rounds shown before the follow-up loop starts.
const QUESTION_ROUNDS: usize = 3;

#[derive(Parser, Debug)]
#[command(about = "Quiz-generation chatbot over identity and security standards")]
struct Args {
    /// Read ad-hoc text from standard input instead of the corpus
    #[arg(long)]
    stdin: bool,

    /// Generate questions from the contents of a single page
    #[arg(long)]
    url: Option<String>,

    /// Characters per chunk when splitting documents
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Characters of overlap between consecutive chunks
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Print the grounding chunk text under each question
    #[arg(long)]
    show_page_content: bool,

    /// Sweep every source of the chosen topic instead of sampling
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let args = Args::parse();

    let mut config = get_config()?;
    if let Some(chunk_size) = args.chunk_size {
        config.chunk_size = chunk_size;
    }
    if let Some(chunk_overlap) = args.chunk_overlap {
        config.chunk_overlap = chunk_overlap;
    }

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));
    let embeddings = Arc::new(EmbeddingProvider::new_openai(
        Arc::clone(&openai_client),
        &config,
    ));
    let model: Arc<dyn ChatModel> = Arc::new(OpenAiChatModel::new(
        openai_client,
        config.chat_model.clone(),
    ));

    // The target decides the question mode: a topic samples the registry,
    // an URL or stdin text questions a throwaway index.
    let (db, target) = if args.stdin {
        println!("Input text, Ctrl+D to finish");
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        let db = adhoc_index_from_text(&text, "stdin", &embeddings, &config).await?;
        (Arc::new(db), String::new())
    } else if let Some(url) = &args.url {
        let db = adhoc_index_from_url(url, &embeddings, &config).await?;
        (Arc::new(db), url.clone())
    } else {
        let db = Arc::new(
            SurrealDbClient::new(
                &config.index_address,
                &config.index_namespace,
                &config.index_database,
            )
            .await?,
        );
        db.ensure_indexes(embeddings.dimension()).await?;

        let pipeline =
            IngestionPipeline::new(Arc::clone(&db), Arc::clone(&embeddings), config.clone());
        pipeline.ensure_sources(&corpus::all_sources()).await?;

        print!("Topic/Category: ");
        io::stdout().flush()?;
        let mut topic = String::new();
        io::stdin().lock().read_line(&mut topic)?;
        (db, topic.trim().to_string())
    };

    let generator = QuestionGenerator::new(
        Arc::clone(&db),
        Arc::clone(&model),
        Arc::clone(&embeddings),
    );
    let answers = AnswerGenerator::new(db, Arc::clone(&model), embeddings, &config);
    let chain = ConversationChain::new(answers.clone(), Arc::clone(&model));

    if args.all {
        let sources = corpus::sources_for(&target).ok_or_else(|| {
            AppError::Validation(format!("--all requires a registered topic, got '{target}'"))
        })?;
        for n in 0..sources.len() {
            let question = generator.by_index(&target, n).await?;
            println!();
            println!("{}", question.render(args.show_page_content));
        }
        return Ok(());
    }

    let mut log = ChatLog::new();
    for _ in 0..QUESTION_ROUNDS {
        println!();
        let question = generator.for_target(&target, None).await?;
        println!("{}", question.render(args.show_page_content));
        log.push(TurnRole::User, question.question.clone());

        println!();
        let answer = answers.answer(&question.question).await?;
        println!("{}", answer.render());
        log.push(TurnRole::Assistant, answer.answer.clone());
    }

    // Follow-up loop over the running conversation, `q` quits.
    loop {
        println!();
        print!("You: ");
        io::stdout().flush()?;

        let mut query = String::new();
        if io::stdin().lock().read_line(&mut query)? == 0 {
            break;
        }
        let query = query.trim();
        if query.eq_ignore_ascii_case("q") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let result = chain.follow_up(&log, query).await?;
        log.push(TurnRole::User, query);
        log.push(TurnRole::Assistant, result.answer.clone());

        println!();
        println!("{}", result.render());
    }

    Ok(())
}
