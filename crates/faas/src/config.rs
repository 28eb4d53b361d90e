use faas_executor::ExecutorConfig;
use faas_loader::LoaderConfig;

/// The two configuration blocks spec.md §6 recognizes: `Loader` and
/// `Executor`. Every `FunctionExecutor` [`crate::FaasCore`] creates shares
/// one `executor` block; a future per-function override is not something
/// spec.md's configuration surface describes.
#[derive(Default)]
pub struct FaasConfig {
    pub loader: LoaderConfig,
    pub executor: ExecutorConfig,
}
