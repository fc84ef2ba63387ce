use std::path::{Path, PathBuf};

use clap::{Arg, ArgMatches, Command};
use telemviz::config::VisualizationConfig;
use telemviz::logging::{init_logging, level_for_verbosity, parse_log_level, LogConfig, LogOutput};
use telemviz::pipeline::VisualizationPipeline;
use telemviz::scene::render_to_file;
use telemviz::source::{CsvFileSource, LatestRunResolver};
use tracing::{error, info};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("telemviz")
        .version("0.1.0")
        .about("テレメトリ可視化 (Telemetry Visualization)")
        .long_about("迎撃シミュレーションのテレメトリとイベントログを読み込み、\n\
                     エージェントの軌跡とイベントを3Dシーンとして出力し、\n\
                     イベントの集計結果を表示します。")
        .arg(
            Arg::new("telemetry_file")
                .value_name("TELEMETRY_FILE")
                .help("テレメトリCSVファイルのパス")
                .long_help("テレメトリCSVファイル (sim_telemetry_*.csv) のパスを指定します。\n\
                           省略した場合、ログディレクトリから最新のファイルを探します。")
                .requires("event_file")
        )
        .arg(
            Arg::new("event_file")
                .value_name("EVENT_FILE")
                .help("イベントCSVファイルのパス")
                .requires("telemetry_file")
        )
        .arg(
            Arg::new("logs_dir")
                .long("logs-dir")
                .value_name("DIR")
                .help("最新ファイルを探すログディレクトリ")
                .long_help("最新の実行結果を探すログディレクトリを指定します。\n\
                           指定しない場合、プラットフォーム既定のディレクトリを使います。")
                .conflicts_with("telemetry_file")
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("可視化設定ファイル(.yaml)のパスを指定")
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .default_value("telemetry_scene.svg")
                .help("シーンの出力先 (.svg または .png)")
        )
        .arg(
            Arg::new("summary_only")
                .long("summary-only")
                .action(clap::ArgAction::SetTrue)
                .help("集計結果のみ表示し、シーンを出力しない")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("可視化設定のみ表示して終了")
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .value_name("LEVEL")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("log_output")
                .long("log-output")
                .value_name("OUTPUT")
                .default_value("console")
                .value_parser(clap::builder::ValueParser::new(str::parse::<LogOutput>))
                .help("ログ出力先 (console, file, both)")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");

    // ログ初期化
    let log_config = LogConfig {
        level: matches
            .get_one::<String>("log_level")
            .map(|s| parse_log_level(s))
            .unwrap_or_else(|| level_for_verbosity(verbose_level)),
        output: matches
            .get_one::<LogOutput>("log_output")
            .copied()
            .unwrap_or(LogOutput::Console),
        ..LogConfig::default()
    };
    let _log_guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&matches, verbose_level) {
        error!("{}", e);
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// 設定の読み込みから出力までを実行
fn run(matches: &ArgMatches, verbose_level: u8) -> Result<(), Box<dyn std::error::Error>> {
    let config = match matches.get_one::<String>("config") {
        Some(path) => {
            let config = VisualizationConfig::from_file(path)?;
            info!("設定ファイル読み込み完了: {}", path);
            config
        }
        None => VisualizationConfig::default(),
    };

    // 情報表示のみの場合
    if matches.get_flag("info") {
        config.print_summary();
        return Ok(());
    }

    // 入力ファイルの解決（失敗した場合はパイプラインを実行しない）
    let source = resolve_source(matches)?;
    if verbose_level > 0 {
        println!("テレメトリ: {}", source.telemetry_path.display());
        println!("イベント: {}", source.event_path.display());
        println!();
    }

    let output_size = (config.output.width, config.output.height);
    let pipeline = VisualizationPipeline::new(config, verbose_level);
    let output = pipeline.run(&source)?;

    print!("{}", output.summary);

    if matches.get_flag("summary_only") {
        return Ok(());
    }

    let output_path = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("telemetry_scene.svg"));
    write_scene(&output, &output_path, output_size)?;

    Ok(())
}

/// 引数で指定されたファイル、またはログディレクトリの最新ファイルを使う
fn resolve_source(matches: &ArgMatches) -> Result<CsvFileSource, Box<dyn std::error::Error>> {
    if let (Some(telemetry), Some(events)) = (
        matches.get_one::<String>("telemetry_file"),
        matches.get_one::<String>("event_file"),
    ) {
        return Ok(CsvFileSource::new(telemetry, events));
    }

    let resolver = match matches.get_one::<String>("logs_dir") {
        Some(dir) => LatestRunResolver::new(dir),
        None => LatestRunResolver::from_platform_default()?,
    };
    let source = resolver.resolve()?;
    println!("最新のファイルを使用: {}", source.telemetry_path.display());
    Ok(source)
}

fn write_scene(
    output: &telemviz::pipeline::PipelineOutput,
    path: &Path,
    size: (u32, u32),
) -> Result<(), Box<dyn std::error::Error>> {
    if output.scene.is_empty() {
        info!("描画する軌跡・イベントがありません（空のシーンを出力します）");
    }
    render_to_file(&output.scene, path, size)?;
    println!();
    println!("シーンを出力しました: {}", path.display());
    Ok(())
}
