//! featureflow 命令行演示
//!
//! 用法: featureflow [config.yaml] <feature | deep-link>
//!
//! 使用自动播放的模拟分发服务安装组件，并打印 UI 状态直到终态

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use featureflow::component::{ComponentConfig, ComponentRegistry, FnEntry};
use featureflow::installer::FakeProvider;
use featureflow::interceptor::Interceptor;
use featureflow::logger::init_tracing;
use featureflow::{FeatureFlow, FlowConfig, UiState};

const AUTOPLAY_STEP: Duration = Duration::from_millis(150);

fn usage() -> ExitCode {
    eprintln!("用法: featureflow [config.yaml] <feature | deep-link>");
    ExitCode::from(2)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (config, target) = match args.as_slice() {
        [target] => (FlowConfig::default(), target.clone()),
        [path, target] => (FlowConfig::load(Path::new(path))?, target.clone()),
        _ => return Ok(usage()),
    };
    init_tracing(&config.logging);

    let is_link = target.contains("://") || target.starts_with('/');
    let feature = if is_link {
        featureflow::route::RouteParser::new(&config.route.prefix)
            .parse(&target)
            .route
            .unwrap_or_default()
    } else {
        target.clone()
    };

    let provider = FakeProvider::with_autoplay(AUTOPLAY_STEP);
    let entry_feature = feature.clone();
    let flow = FeatureFlow::builder(Arc::new(provider.clone()))
        .config(config)
        .entry(Arc::new(FnEntry::new(
            "demo",
            move |registry: &dyn ComponentRegistry| {
                let name = entry_feature.clone();
                registry.register(ComponentConfig::new(&entry_feature).with_interceptor(
                    Interceptor::post_fn("warm-up", move || {
                        tracing::info!(feature = %name, "[DEMO] 组件初始化完成");
                        Ok(true)
                    }),
                ));
                Ok(())
            },
        )))
        .build();

    let orchestrator = flow.orchestrator.clone();
    let mut rx = orchestrator.subscribe();

    let started = if is_link {
        orchestrator.load_from_uri(&target).await
    } else {
        orchestrator.load_feature(&target).await
    };
    if let Err(e) = started {
        eprintln!("{}", e);
        return Ok(ExitCode::FAILURE);
    }

    loop {
        let state = rx.borrow_and_update().clone();
        println!("{}", state);

        match &state {
            UiState::RequiresConfirmation { feature } => {
                // 演示中自动确认
                if let Some(payload) = orchestrator.current_confirmation_payload() {
                    orchestrator.confirm_installation(feature);
                    provider.confirm(payload.session_id);
                }
            }
            UiState::Success { warnings, .. } => {
                for warning in warnings {
                    println!("  警告: {}", warning);
                }
                return Ok(ExitCode::SUCCESS);
            }
            UiState::Error { error, .. } => {
                println!("{}", error.to_json());
                return Ok(ExitCode::FAILURE);
            }
            _ => {}
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(ExitCode::FAILURE);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                orchestrator.shutdown();
                return Ok(ExitCode::FAILURE);
            }
        }
    }
}
