use anyhow::{Context, Result};
use parley_forum::parse_comment_permalink;
use parley_runtime::{
    build_downward_chain, compose_mode_prompt, mode_display_label, AncestorChain, Mode,
};

use crate::cli_args::{PromptArgs, ScrapeArgs};
use crate::startup::{build_reddit_client, load_prompt_template};

pub(crate) fn render_scrape_output(mode_prompt: &str, chain: &AncestorChain) -> String {
    format!("{}\n\n{}", mode_prompt.trim_end(), chain.render_transcript())
}

/// Fetches the thread anonymously and prints the mode prompt followed by the transcript.
pub(crate) async fn run_scrape(args: ScrapeArgs) -> Result<()> {
    let permalink = parse_comment_permalink(&args.url)?;
    let template = load_prompt_template(args.prompt.prompt_template.as_deref())?;
    let mode = Mode::from(args.prompt.mode);
    let mode_prompt = compose_mode_prompt(mode, &template)
        .with_context(|| format!("prompt template does not resolve for mode '{mode}'"))?;

    let client = build_reddit_client(&args.reddit, &args.reddit.public_base, None)?;
    let snapshot = client
        .fetch_thread(&permalink)
        .await
        .with_context(|| format!("failed to fetch thread {}", args.url))?;
    let chain = build_downward_chain(
        snapshot.submission,
        &snapshot.top_level,
        permalink.target_comment_id.as_deref(),
    );
    println!("{}", render_scrape_output(&mode_prompt, &chain));
    Ok(())
}

pub(crate) fn run_prompt(args: PromptArgs) -> Result<()> {
    let template = load_prompt_template(args.prompt.prompt_template.as_deref())?;
    let mode = Mode::from(args.prompt.mode);
    let prompt = compose_mode_prompt(mode, &template)
        .with_context(|| format!("prompt template does not resolve for mode '{mode}'"))?;
    println!("{prompt}");
    Ok(())
}

pub(crate) fn render_mode_listing() -> String {
    Mode::UI_ORDER
        .iter()
        .map(|mode| format!("{:<12}{}", mode.as_str(), mode_display_label(*mode)))
        .collect::<Vec<_>>()
        .join("\n")
}
