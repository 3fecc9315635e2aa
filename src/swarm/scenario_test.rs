//! End-to-end controller scenarios against a teleported fake robot.
//!
//! Run: cargo test scenario

#[cfg(test)]
mod tests {
    use crate::core::{SimulationConfig, Vec2};
    use crate::swarm::agent::{CpfaState, ForagingAgent, Phase};
    use crate::swarm::arena::SharedArenaState;
    use crate::swarm::navigation::testing::FakeRobot;
    use crate::swarm::pheromone::PheromoneTrail;
    use crate::swarm::rng::testing::ScriptedRng;
    use crate::swarm::rng::SimRng;

    fn advance_to_scan_tick(arena: &mut SharedArenaState) {
        arena.advance_tick();
        while !arena.is_scan_tick() {
            arena.advance_tick();
        }
    }

    /// DEPARTING -> SEARCHING -> RETURNING -> drop-off for a single robot.
    #[test]
    fn scenario_single_trip_to_food_and_back() {
        let mut cfg = SimulationConfig::default();
        cfg.arena.nest_radius = 0.1;
        cfg.cpfa.probability_of_returning_to_nest = 0.0;
        let mut arena = SharedArenaState::new(&cfg, vec![Vec2::new(5.0, 0.0)]);
        let mut agent = ForagingAgent::departing(0, Vec2::new(9.0, 0.0));
        let mut robot = FakeRobot::at(0.0, 0.0);
        // every uniform draw is 0: the switch-to-search draw always hits
        let mut rng = ScriptedRng::constant(0.0);

        arena.advance_tick();
        agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
        assert_eq!(agent.state(), CpfaState::Searching);
        assert!(!agent.is_informed());

        robot.teleport(5.0, 0.0);
        advance_to_scan_tick(&mut arena);
        agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
        assert!(agent.is_holding_food());
        assert_eq!(agent.state(), CpfaState::Returning);
        assert_eq!(agent.resource_density(), 1);
        assert_eq!(agent.fidelity_position(), Some(Vec2::new(5.0, 0.0)));
        assert!(arena.food().is_empty());

        // the pickup pause holds the robot still
        arena.advance_tick();
        agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
        assert_eq!(robot.wheels, (0.0, 0.0));
        assert!(agent.is_holding_food());

        robot.teleport(0.0, 0.0);
        let mut guard = 0;
        while agent.is_holding_food() {
            arena.advance_tick();
            agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
            guard += 1;
            assert!(guard < 200, "robot never dropped its food");
        }

        assert_eq!(arena.food_delivered(), 1);
        assert_eq!(agent.food_delivered(), 1);
        // lay draw 0 < Poisson CDF, so a trail from the pickup site is laid
        assert_eq!(agent.trails_laid(), 1);
        let trail = &arena.pheromones().trails()[0];
        assert_eq!(trail.origin(), Vec2::new(5.0, 0.0));
        assert_eq!(trail.endpoint(), Some(Vec2::ZERO));
        // and the fidelity draw sends it back to the same site
        assert_eq!(agent.state(), CpfaState::Departing);
        assert!(agent.is_informed());
        assert_eq!(agent.target(), Vec2::new(5.0, 0.0));
    }

    #[test]
    fn scenario_fidelity_site_committed_on_arrival_not_on_pickup() {
        let mut cfg = SimulationConfig::default();
        cfg.arena.nest_radius = 0.1;
        cfg.cpfa.probability_of_returning_to_nest = 0.0;
        let food = vec![Vec2::new(2.0, 2.0), Vec2::new(2.1, 2.0)];
        let mut arena = SharedArenaState::new(&cfg, food);
        let mut agent = ForagingAgent::new(3, Vec2::ZERO);
        agent_search_from(&mut agent, &mut arena);
        let mut robot = FakeRobot::at(2.0, 2.0);
        let mut rng = ScriptedRng::constant(0.0);

        advance_to_scan_tick(&mut arena);
        agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
        assert!(agent.is_holding_food());
        assert!(arena.fidelity().is_empty());

        robot.teleport(0.0, 0.0);
        while agent.state() != CpfaState::Departing {
            arena.advance_tick();
            agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
        }
        assert!(arena.fidelity().is_empty());

        robot.teleport(2.0, 2.0);
        arena.advance_tick();
        agent.control_step(&mut robot, &mut arena, &mut rng).unwrap();
        assert_eq!(agent.state(), CpfaState::Searching);
        assert_eq!(arena.fidelity().get(3), Some(Vec2::new(2.0, 2.0)));
    }

    fn agent_search_from(agent: &mut ForagingAgent, arena: &mut SharedArenaState) {
        // a departing agent standing on its final target switches to searching
        let mut robot = FakeRobot::at(0.0, 0.0);
        let mut rng = ScriptedRng::constant(0.9);
        *agent = ForagingAgent::departing(agent.id(), Vec2::ZERO);
        arena.advance_tick();
        let _ = agent.control_step(&mut robot, arena, &mut rng);
        assert!(matches!(agent.phase(), Phase::Searching { trail: None }));
    }

    #[test]
    fn no_food_item_is_claimed_twice_in_one_tick() {
        let cfg = SimulationConfig::default();
        let mut arena = SharedArenaState::new(&cfg, vec![Vec2::new(3.0, 3.0)]);
        let mut agents: Vec<ForagingAgent> = (0..4)
            .map(|i| {
                let mut a = ForagingAgent::new(i, Vec2::ZERO);
                agent_search_from(&mut a, &mut arena);
                a
            })
            .collect();
        let mut robots: Vec<FakeRobot> = (0..4).map(|_| FakeRobot::at(3.0, 3.01)).collect();
        let mut rng = ScriptedRng::constant(0.9);

        advance_to_scan_tick(&mut arena);
        let before = arena.food().len();
        for (agent, robot) in agents.iter_mut().zip(robots.iter_mut()) {
            agent.control_step(robot, &mut arena, &mut rng).unwrap();
        }
        let holders: Vec<u32> = agents
            .iter()
            .filter(|a| a.is_holding_food())
            .map(|a| a.id())
            .collect();
        assert_eq!(holders, vec![0]);
        assert_eq!(before - arena.food().len(), holders.len());
    }

    #[test]
    fn scenario_trail_is_found_until_it_fades() {
        let cfg = SimulationConfig::default();
        let mut arena = SharedArenaState::new(&cfg, Vec::new());
        let tolerance = arena.controller().distance_tolerance;
        let decay = arena.pheromone_decay_per_tick();
        let waypoints = vec![Vec2::new(4.0, 1.0), Vec2::new(2.0, 0.5), Vec2::ZERO];
        let trail = PheromoneTrail::with_strength(
            waypoints[0],
            waypoints.clone(),
            vec![0, 1, 2],
            arena.tick(),
            decay,
            1.0,
            arena.pheromone_threshold(),
        )
        .unwrap();
        arena.deposit_trail(trail);

        // strength crosses the threshold after ln(1/threshold)/rate ticks
        let lifetime = ((1.0 / arena.pheromone_threshold()).ln() / decay).floor() as u64;
        while arena.tick() < lifetime {
            arena.advance_tick();
        }
        for w in &waypoints {
            assert!(arena.pheromones().find_near(*w, tolerance).is_some());
        }

        arena.advance_tick();
        arena.advance_tick();
        for w in &waypoints {
            assert!(arena.pheromones().find_near(*w, tolerance).is_none());
        }
        let mut rng = SimRng::seeded(4);
        assert!(arena.pheromones().select_weighted(&mut rng).is_none());
    }
}
