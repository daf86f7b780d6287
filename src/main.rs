use chrono::NaiveDate;
use clap::Parser;
use project_hub::config::cli::{Cli, Command, FormArgs, LandingArgs, LetterArgs, WorkshopArgs};
use project_hub::core::landing::{preview_pages, publish_landing};
use project_hub::core::{FormPublisher, Storage};
use project_hub::utils::error::ErrorSeverity;
use project_hub::utils::{logger, validation::Validate};
use project_hub::{
    GitHubClient, GoogleAuth, GoogleForms, HubConfig, HubEngine, LandingPipeline, LocalStorage,
    OpenAiCompatClient, PublicationPipeline, Result, WorkshopPipeline,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting project-hub");

    if let Err(e) = run(cli).await {
        tracing::error!(
            "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = HubConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output {
        config.output.dir = dir;
    }
    config.validate()?;
    tracing::debug!("Config: provider={} output={}", config.llm.provider, config.output.dir);

    let storage = LocalStorage::new(&config.output.dir);
    let today = chrono::Local::now().date_naive();

    match cli.command {
        Command::Landing(args) => run_landing(&config, storage, &args, today).await,
        Command::Workshop(args) => run_workshop(&config, storage, &args, today).await,
        Command::Letter(args) => run_letter(&config, storage, &args, today).await,
        Command::Form(args) => run_form(&config, &args).await,
    }
}

fn chat_client(config: &HubConfig) -> Result<OpenAiCompatClient> {
    let client = OpenAiCompatClient::new(config.provider()?, config.api_key()?);
    Ok(match config.llm.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => client.with_base_url(url),
        None => client,
    })
}

fn github_client(config: &HubConfig) -> Result<GitHubClient> {
    let mut client = GitHubClient::new(config.github_token()?)?;
    if let Some(url) = config.github.api_url.as_deref().filter(|u| !u.trim().is_empty()) {
        client = client.with_base_url(url);
    }
    if let Some(agent) = config.github.user_agent.as_deref().filter(|a| !a.trim().is_empty()) {
        client = client.with_user_agent(agent);
    }
    Ok(client)
}

async fn google_forms(config: &HubConfig) -> Result<GoogleForms> {
    let auth = GoogleAuth::from_files(&config.forms.credentials_path, config.forms.token_path.clone())
        .await?;
    Ok(GoogleForms::new(auth))
}

async fn run_landing(
    config: &HubConfig,
    storage: LocalStorage,
    args: &LandingArgs,
    today: NaiveDate,
) -> Result<()> {
    let request = args.to_request(config.github_owner());
    request.validate()?;

    let pipeline = LandingPipeline::new(chat_client(config)?, config.step_models()?, request, today);
    let engine = HubEngine::new(pipeline, storage.clone());
    let report = engine.run().await?;

    println!("{}\n", report.plan.markdown);
    println!("✅ Generated {} files:", report.output.len());
    for name in report.output.files.keys() {
        println!("   • {}", name);
    }
    println!("📦 Bundle: {}", storage.full_path(&report.bundle_path).display());

    if args.preview {
        for (name, html) in preview_pages(&report.output) {
            let path = format!("preview/{}", name);
            storage.write_file(&path, html.as_bytes()).await?;
            println!("👀 Preview: {}", storage.full_path(&path).display());
        }
    }

    if args.push {
        let github = github_client(config)?;
        let published = publish_landing(&github, &engine.pipeline().request().repo, &report.output).await?;
        println!(
            "🚀 Pushed {} files to {}",
            published.files_pushed, published.html_url
        );
    }

    Ok(())
}

async fn run_workshop(
    config: &HubConfig,
    storage: LocalStorage,
    args: &WorkshopArgs,
    today: NaiveDate,
) -> Result<()> {
    let request = args.to_request(today);
    request.validate()?;

    let mut pipeline = WorkshopPipeline::new(chat_client(config)?, config.step_models()?, request);
    if args.form {
        match google_forms(config).await {
            Ok(forms) => pipeline = pipeline.with_forms(Box::new(forms)),
            Err(e) => tracing::warn!("Google Forms unavailable, continuing without a form: {}", e),
        }
    }

    let report = HubEngine::new(pipeline, storage.clone()).run().await?;
    let assets = &report.output;

    println!("{}\n", report.plan.markdown);
    println!("── Invite email ──\n{}\n", assets.invite_email);
    println!("── Poster ──\n{}\n", assets.poster_text);
    println!("── Checklist ──\n{}\n", assets.checklist);
    if let Some(url) = &assets.google_form_url {
        println!("📝 Registration form: {}", url);
    }
    println!("📦 Bundle: {}", storage.full_path(&report.bundle_path).display());
    Ok(())
}

async fn run_letter(
    config: &HubConfig,
    storage: LocalStorage,
    args: &LetterArgs,
    today: NaiveDate,
) -> Result<()> {
    let pipeline = PublicationPipeline::new(
        chat_client(config)?,
        config.step_models()?,
        args.topic.clone(),
        today,
    );
    let report = HubEngine::new(pipeline, storage.clone()).run().await?;

    println!("── Research letter ──\n{}\n", report.output.letter_content);
    println!("── Blog post ──\n{}\n", report.output.blog_content);
    println!("📦 Bundle: {}", storage.full_path(&report.bundle_path).display());
    Ok(())
}

async fn run_form(config: &HubConfig, args: &FormArgs) -> Result<()> {
    let forms = google_forms(config).await?;
    let info = forms
        .create_registration_form(&args.title, &args.description)
        .await?;

    println!("✅ Google Form created successfully!");
    println!("Share URL: {}", info.share_url());
    println!("Edit URL: {}", info.edit_url);
    Ok(())
}
