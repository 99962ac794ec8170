pub mod policy;

pub use policy::{
    AgentError, BayesianConfig, BayesianTomAgent, ConfigError, DecisionRecord, GreedyAgent,
    LambdaSchedule, NegotiationAgent, RandomAgent, SocialAgent,
};
