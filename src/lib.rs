/*!
Monte-Carlo estimation of confirmation latency and common prefix for
proof-of-work blockchains.

Two fork-choice rules are compared: Nakamoto (every block weighs the same)
and entropy-weighted proof of work, where a block weighs the amount of
entropy its hash carries. Honest and adversarial progress is sampled as
weight-time series, and the number of blocks an honest party must wait
before a block is safe is read off from where the honest chain outpaces
a private adversarial chain at every subsequent level.

```
use poem_sim::prelude::*;

let config = SimulationConfig::builder()
    .g(0.7)
    .beta(0.3)
    .protocol(Protocol::EntropyWeighted)
    .trials(50)
    .horizon(200)
    .build()
    .unwrap();

let estimate = LatencyEstimator::new(config).estimate();
assert_eq!(estimate.trials, 50);
```
*/

pub mod adversary;
pub mod backbone;
pub mod block;
pub mod blocktree;
pub mod common_prefix;
pub mod config;
pub mod latency;
pub mod prelude;
pub mod report;
pub mod sampler;
pub mod sweep;
pub mod work;
