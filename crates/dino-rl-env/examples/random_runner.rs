//! Example: Random agent playing the dino runner

use dino_rl_env::{ActionSpace, DinoEnv, Environment, EnvironmentConfig, Reward, TimeLimit};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    tracing_subscriber::fmt::init();

    let config = EnvironmentConfig { seed: Some(7) };
    let mut env = TimeLimit::new(DinoEnv::new(&config), 2_000);
    let mut rng = StdRng::seed_from_u64(7);

    let num_episodes = 10;
    let mut scores = Vec::with_capacity(num_episodes);

    for episode in 0..num_episodes {
        env.reset();
        let mut total_reward = Reward::default();
        let mut steps = 0;

        loop {
            let step = env.step(ActionSpace.sample(&mut rng));
            total_reward += step.reward;
            steps += 1;
            if step.is_over() {
                break;
            }
        }

        scores.push(env.score());
        println!(
            "Episode {}: Score = {:.1}, Total Reward = {:.2}, Steps = {}",
            episode + 1,
            env.score(),
            total_reward.value(),
            steps
        );
    }

    let average = scores.iter().sum::<f64>() / scores.len() as f64;
    println!("\nAverage score over {num_episodes} episodes: {average:.1}");
}
