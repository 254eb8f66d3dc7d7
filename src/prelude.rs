/*!
Re-export of common values and datatypes used for running and analyzing
simulations. Must be imported manually.

```
use poem_sim::prelude::*;
```
*/

use crate::{
    adversary, backbone, block, blocktree, common_prefix, config, latency,
    report, sampler, sweep, work,
};

pub use adversary::{Adversary, Balancing, Idle, PrivateMining};

pub use backbone::{
    Backbone, BackboneBuilder, BackboneError, BackboneOutcome, BackboneSummary,
};

pub use block::{Block, BlockId};

pub use blocktree::{BlockTree, BlockTreeError};

pub use common_prefix::CommonPrefixAnalyzer;

pub use config::{ConfigError, SimulationConfig, SimulationConfigBuilder};

pub use latency::{
    get_k, Confirmation, LatencyEstimate, LatencyEstimator, TrialResult,
};

pub use report::{Format, ResultsTable};

pub use sampler::{
    AdversaryProcess, HonestProcess, Progress, RoundModel, WeightTimeSeries,
};

pub use sweep::{
    ComparisonRecord, ParameterSweep, ParameterSweepBuilder, SweepAxis,
    SweepError, SweepRecord,
};

pub use work::{Protocol, WorkModel, WorkSample};
